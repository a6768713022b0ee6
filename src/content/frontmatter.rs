//! Reading and writing content files: a YAML front-matter block delimited by
//! `---` lines, followed by the Markdown/MDX body.
//!
//! Both stores go through these two functions, so a file written by one is
//! read identically by the other.

use crate::content::models::FrontMatter;
use crate::error::AppError;

const DELIMITER: &str = "---";

/// Result of parsing a content file. Parsing never fails outright: a broken
/// front-matter block yields default front-matter plus `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    pub front_matter: FrontMatter,
    pub body: String,
    pub error: Option<String>,
}

/// Parse a content file into front-matter and body.
///
/// A file that does not start with a `---` line has no front-matter and is
/// all body. One blank line after the closing delimiter is not part of the
/// body (it is what [`serialize`] writes).
pub fn parse(source: &str) -> ParsedFile {
    let Some(rest) = strip_delimiter_line(source) else {
        return ParsedFile {
            front_matter: FrontMatter::default(),
            body: source.to_string(),
            error: None,
        };
    };

    let Some((yaml, body)) = split_block(rest) else {
        return ParsedFile {
            front_matter: FrontMatter::default(),
            body: source.to_string(),
            error: Some("Front-matter block is not closed".to_string()),
        };
    };

    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body)
        .to_string();

    if yaml.trim().is_empty() {
        return ParsedFile {
            front_matter: FrontMatter::default(),
            body,
            error: None,
        };
    }

    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(front_matter) => ParsedFile {
            front_matter,
            body,
            error: None,
        },
        Err(e) => ParsedFile {
            front_matter: FrontMatter::default(),
            body,
            error: Some(format!("Front-matter could not be parsed: {e}")),
        },
    }
}

/// Serialize front-matter and body into the on-disk / in-repo file format.
pub fn serialize(front_matter: &FrontMatter, body: &str) -> Result<String, AppError> {
    let yaml = serde_yaml::to_string(front_matter)
        .map_err(|e| AppError::Internal(format!("Failed to serialize front-matter: {e}")))?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{body}"))
}

/// If `source` opens with a delimiter line, return what follows it.
fn strip_delimiter_line(source: &str) -> Option<&str> {
    let rest = source.strip_prefix(DELIMITER)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

/// Split at the first closing delimiter line: `(yaml, text after that line)`.
fn split_block(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if content == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::models::{Author, Status};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_basic() {
        let source = "---\ntitle: Hello\nstatus: published\n---\n\n# Heading\n\nText.\n";
        let parsed = parse(source);
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.front_matter.title, "Hello");
        assert_eq!(parsed.front_matter.status, Status::Published);
        assert_eq!(parsed.body, "# Heading\n\nText.\n");
    }

    #[test]
    fn test_parse_without_front_matter() {
        let parsed = parse("# Just markdown\n");
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.front_matter, FrontMatter::default());
        assert_eq!(parsed.body, "# Just markdown\n");
    }

    #[test]
    fn test_parse_crlf() {
        let parsed = parse("---\r\ntitle: Windows\r\n---\r\nBody\r\n");
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.front_matter.title, "Windows");
        assert_eq!(parsed.body, "Body\r\n");
    }

    #[test]
    fn test_parse_custom_fields_and_fixed_fields() {
        let source = r#"---
title: Launch
status: published
publishedAt: 2024-03-01T10:00:00Z
author:
  name: Ada
  picture: https://example.com/ada.png
coverImage: /images/launch.png
description: We launched
category: news
featured: true
---
Body"#;
        let parsed = parse(source);
        assert_eq!(parsed.error, None);
        let fm = parsed.front_matter;
        assert_eq!(
            fm.published_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(fm.author.unwrap().name.as_deref(), Some("Ada"));
        assert_eq!(fm.cover_image.as_deref(), Some("/images/launch.png"));
        assert_eq!(fm.custom["category"], serde_yaml::Value::String("news".into()));
        assert_eq!(fm.custom["featured"], serde_yaml::Value::Bool(true));
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn test_unclosed_block_is_flagged() {
        let source = "---\ntitle: Hello\nno closing";
        let parsed = parse(source);
        assert!(parsed.error.unwrap().contains("not closed"));
        assert_eq!(parsed.body, source);
    }

    #[test]
    fn test_malformed_yaml_is_flagged_not_dropped() {
        let parsed = parse("---\ntitle: [unterminated\n---\nStill here\n");
        assert!(parsed.error.unwrap().contains("could not be parsed"));
        assert_eq!(parsed.body, "Still here\n");
    }

    #[test]
    fn test_empty_block() {
        let parsed = parse("---\n---\nBody");
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn test_dashes_inside_body_are_kept() {
        let parsed = parse("---\ntitle: T\n---\n\nintro\n\n---\n\nafter rule\n");
        assert_eq!(parsed.body, "intro\n\n---\n\nafter rule\n");
    }

    #[test]
    fn test_serialize_then_parse_preserves_content() {
        let mut fm = FrontMatter::titled("Hello");
        fm.status = Status::Published;
        fm.published_at = Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        fm.author = Some(Author {
            name: Some("Ada".into()),
            picture: None,
        });
        fm.custom.insert(
            "tags".into(),
            serde_yaml::from_str("[a, b]").unwrap(),
        );
        let body = "\nLeading blank line, trailing none";

        let text = serialize(&fm, body).unwrap();
        assert!(text.starts_with("---\ntitle: Hello\n"));

        let parsed = parse(&text);
        assert_eq!(parsed.error, None);
        assert_eq!(parsed.front_matter, fm);
        assert_eq!(parsed.body, body);
    }
}
