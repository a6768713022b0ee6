use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::content::models::{validate_slug, DocumentSummary, FrontMatter};
use crate::error::AppError;

/// Kind of a custom front-matter field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// Single-line string.
    String,
    /// Multi-line string.
    Text,
    Number,
    Boolean,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    Date,
    /// Image URL or repository path.
    Image,
    /// List of strings (or `{ label, value }` objects).
    Tags,
    /// Slug of a document in another collection.
    Reference { collection: String },
}

/// A custom field declared by a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub title: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Whether a collection holds many documents or exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    List,
    /// Exactly one document, stored under the fixed `slug`.
    Singleton { slug: String },
}

/// Listing order of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    PublishedAtDesc,
    PublishedAtAsc,
    TitleAsc,
}

/// Declarative schema of a collection, stored as `schema.json` in its directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub kind: CollectionKind,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub fields: BTreeMap<String, CustomField>,
}

/// One validation problem, attached to the field it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Front-matter keys with built-in meaning; custom fields may not reuse them.
pub const RESERVED_FIELDS: &[&str] = &[
    "title",
    "status",
    "publishedAt",
    "author",
    "coverImage",
    "description",
];

impl CollectionSchema {
    /// Schema assumed for a collection directory without `schema.json`.
    pub fn list(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CollectionKind::List,
            sort: SortOrder::default(),
            fields: BTreeMap::new(),
        }
    }

    pub fn singleton(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            kind: CollectionKind::Singleton { slug: slug.into() },
            ..Self::list(name)
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field: CustomField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Fixed slug of a singleton collection.
    pub fn singleton_slug(&self) -> Option<&str> {
        match &self.kind {
            CollectionKind::Singleton { slug } => Some(slug),
            CollectionKind::List => None,
        }
    }

    /// Problems with the schema itself (not with documents).
    pub fn check(&self) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        for (name, field) in &self.fields {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                issues.push(FieldIssue::new(
                    name,
                    format!("'{name}' is a built-in field and cannot be redefined"),
                ));
            }
            if field.title.trim().is_empty() {
                issues.push(FieldIssue::new(name, "Field title cannot be empty"));
            }
            if let FieldKind::Reference { collection } = &field.kind {
                if collection.is_empty() {
                    issues.push(FieldIssue::new(name, "Reference needs a target collection"));
                }
            }
        }
        if let CollectionKind::Singleton { slug } = &self.kind {
            if let Err(e) = validate_slug("Singleton slug", slug) {
                issues.push(FieldIssue::new("kind", message_of(e)));
            }
        }
        issues
    }

    /// Validate front-matter against the fixed fields and this schema's custom fields.
    ///
    /// Unknown custom keys are kept and never reported.
    pub fn validate(&self, front_matter: &FrontMatter) -> Vec<FieldIssue> {
        let mut issues = Vec::new();

        if front_matter.title.trim().is_empty() {
            issues.push(FieldIssue::new("title", "Title is required"));
        }

        for (name, field) in &self.fields {
            match front_matter.custom.get(name) {
                None | Some(Value::Null) => {
                    if field.required {
                        issues.push(required(name, field));
                    }
                }
                Some(value) => {
                    if let Some(issue) = check_value(name, field, value) {
                        issues.push(issue);
                    }
                }
            }
        }

        issues
    }

    /// Order summaries in place according to `sort`. Documents without a
    /// publication date sort after dated ones; ties break on slug.
    pub fn sort(&self, docs: &mut [DocumentSummary]) {
        docs.sort_by(|a, b| {
            let primary = match self.sort {
                SortOrder::PublishedAtDesc => by_date(a, b, true),
                SortOrder::PublishedAtAsc => by_date(a, b, false),
                SortOrder::TitleAsc => a
                    .front_matter
                    .title
                    .to_lowercase()
                    .cmp(&b.front_matter.title.to_lowercase()),
            };
            primary.then_with(|| a.slug.cmp(&b.slug))
        });
    }
}

fn by_date(a: &DocumentSummary, b: &DocumentSummary, descending: bool) -> Ordering {
    match (a.front_matter.published_at, b.front_matter.published_at) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn message_of(error: AppError) -> String {
    match error {
        AppError::BadRequest(message) => message,
        other => other.to_string(),
    }
}

fn required(name: &str, field: &CustomField) -> FieldIssue {
    FieldIssue::new(name, format!("{} is required", field.title))
}

fn check_value(name: &str, field: &CustomField, value: &Value) -> Option<FieldIssue> {
    let mismatch = |expected: &str| {
        Some(FieldIssue::new(
            name,
            format!("{} must be {expected}", field.title),
        ))
    };

    match &field.kind {
        FieldKind::String | FieldKind::Text | FieldKind::Image | FieldKind::Reference { .. } => {
            match value {
                Value::String(s) if s.trim().is_empty() && field.required => {
                    Some(required(name, field))
                }
                Value::String(_) => None,
                _ => mismatch("text"),
            }
        }
        FieldKind::Number => match value {
            Value::Number(_) => None,
            _ => mismatch("a number"),
        },
        FieldKind::Boolean => match value {
            Value::Bool(_) => None,
            _ => mismatch("true or false"),
        },
        FieldKind::Date => match value {
            Value::String(s) if is_date(s) => None,
            _ => mismatch("a date"),
        },
        FieldKind::Tags => match value {
            Value::Sequence(items) if items.iter().all(is_tag) => {
                if items.is_empty() && field.required {
                    Some(required(name, field))
                } else {
                    None
                }
            }
            _ => mismatch("a list of tags"),
        },
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_tag(item: &Value) -> bool {
    match item {
        Value::String(_) => true,
        Value::Mapping(map) => matches!(map.get("value"), Some(Value::String(_))),
        _ => false,
    }
}
