use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::schema::FieldIssue;
use crate::error::AppError;

/// Publication status of a document. Drafts never reach public rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
}

/// Author reference stored in front-matter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// Front-matter of a content file: the fixed fields every document carries
/// plus whatever custom fields its collection schema defines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontMatter {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema-defined fields, kept in key order for stable output.
    #[serde(flatten)]
    pub custom: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Front-matter with only a title set.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Source format of a content file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Md,
    Mdx,
}

impl ContentFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContentFormat::Md => "md",
            ContentFormat::Mdx => "mdx",
        }
    }

    /// Split a file name into `(stem, format)` if its extension is a
    /// recognized content extension (`.md` / `.mdx`, any case).
    pub fn from_file_name(name: &str) -> Option<(&str, ContentFormat)> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        let format = if ext.eq_ignore_ascii_case("md") {
            ContentFormat::Md
        } else if ext.eq_ignore_ascii_case("mdx") {
            ContentFormat::Mdx
        } else {
            return None;
        };
        Some((stem, format))
    }
}

/// A full content document: identity, parsed front-matter and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub collection: String,
    pub slug: String,
    pub format: ContentFormat,
    pub front_matter: FrontMatter,
    pub body: String,
    /// Validation problems against the collection schema. Empty when valid.
    #[serde(default)]
    pub issues: Vec<FieldIssue>,
}

/// Listing form of a document: everything but the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub collection: String,
    pub slug: String,
    pub format: ContentFormat,
    pub front_matter: FrontMatter,
    #[serde(default)]
    pub issues: Vec<FieldIssue>,
}

impl Document {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Valid and published: the only documents public rendering may show.
    pub fn is_public(&self) -> bool {
        self.is_valid() && self.front_matter.status == Status::Published
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            collection: self.collection.clone(),
            slug: self.slug.clone(),
            format: self.format,
            front_matter: self.front_matter.clone(),
            issues: self.issues.clone(),
        }
    }
}

impl DocumentSummary {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn is_public(&self) -> bool {
        self.is_valid() && self.front_matter.status == Status::Published
    }
}

/// Check that a slug or collection name is a single safe path segment:
/// lowercase ASCII letters, digits, `-` and `_`.
pub fn validate_slug(what: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{what} cannot be empty")));
    }
    let ok = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !ok {
        return Err(AppError::BadRequest(format!(
            "Invalid {what} '{value}'. Expected lowercase letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

/// Turn a title into a slug candidate (`"Hello, World!"` → `"hello-world"`).
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
