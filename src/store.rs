//! Content persistence. Two backends share one trait: the remote git host
//! (GitHub GraphQL) and a local working tree. Backends implement two
//! primitives; every document and collection operation is written once on
//! top of them, so both stores parse and lay out files identically.

pub mod github;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::auth::models::AccessToken;
use crate::config::ContentConfig;
use crate::content::frontmatter;
use crate::content::models::{
    validate_slug, ContentFormat, Document, DocumentSummary, FrontMatter,
};
use crate::content::schema::{CollectionSchema, FieldIssue};
use crate::error::AppError;

const SCHEMA_FILE: &str = "schema.json";

/// Repository-relative locations of collections, documents and media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    pub base: String,
    pub media_path: String,
    pub media_url: String,
}

impl ContentLayout {
    pub fn new(
        base: impl Into<String>,
        media_path: impl Into<String>,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            base: trim_path(&base.into()),
            media_path: trim_path(&media_path.into()),
            media_url: media_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(&config.base_path, &config.media_path, &config.media_url)
    }

    pub fn collection_dir(&self, collection: &str) -> String {
        join(&self.base, collection)
    }

    pub fn schema_path(&self, collection: &str) -> String {
        join(&self.collection_dir(collection), SCHEMA_FILE)
    }

    pub fn document_path(&self, collection: &str, slug: &str, format: ContentFormat) -> String {
        join(
            &self.collection_dir(collection),
            &format!("{slug}.{}", format.extension()),
        )
    }

    pub fn media_file(&self, file_name: &str) -> String {
        join(&self.media_path, file_name)
    }

    pub fn media_public_url(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.media_url)
    }
}

/// Every file name a document with this slug may have: the exact stem with
/// `.md` or `.mdx` in any letter case, lowercase spellings first.
pub fn document_file_names(slug: &str) -> Vec<String> {
    [ContentFormat::Md, ContentFormat::Mdx]
        .iter()
        .flat_map(|format| case_spellings(format.extension()))
        .map(|ext| format!("{slug}.{ext}"))
        .collect()
}

fn case_spellings(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    (0..1u32 << chars.len())
        .map(|mask| {
            chars
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if mask & (1 << i) != 0 {
                        c.to_ascii_uppercase()
                    } else {
                        *c
                    }
                })
                .collect()
        })
        .collect()
}

fn trim_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One directory entry. `contents` is only filled for files the listing
/// asked to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    pub contents: Option<String>,
}

impl Entry {
    pub fn file(name: impl Into<String>, contents: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            contents,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
            contents: None,
        }
    }
}

/// Which file texts a directory listing carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contents<'a> {
    /// Names and kinds only.
    Names,
    /// Text of every file.
    All,
    /// Text of the files with these names, when they exist.
    Only(&'a [String]),
}

impl Contents<'_> {
    pub fn wants(&self, name: &str) -> bool {
        match self {
            Contents::Names => false,
            Contents::All => true,
            Contents::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// A directory as read in a single round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub entries: Vec<Entry>,
    /// Branch head the listing was read at. Only the remote store knows one.
    pub revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAddition {
    pub path: String,
    pub contents: Vec<u8>,
}

/// Files to write and remove together. The remote store commits a change
/// set atomically; the local store applies it in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub message: String,
    pub additions: Vec<FileAddition>,
    pub deletions: Vec<String>,
    /// Revision the change was prepared against. The remote store refuses
    /// the commit when the branch moved past it.
    pub revision: Option<String>,
}

impl ChangeSet {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn add(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.additions.push(FileAddition {
            path: path.into(),
            contents: contents.into(),
        });
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.deletions.push(path.into());
        self
    }

    pub fn at(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// A collection directory and its schema, read together.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub schema: CollectionSchema,
    pub entries: Vec<Entry>,
    pub revision: Option<String>,
}

impl CollectionSnapshot {
    fn from_listing(name: &str, listing: Listing) -> Self {
        let schema_text = listing
            .entries
            .iter()
            .find(|e| e.kind == EntryKind::File && e.name == SCHEMA_FILE)
            .and_then(|e| e.contents.as_deref());
        let schema = match schema_text.map(serde_json::from_str::<CollectionSchema>) {
            Some(Ok(mut schema)) => {
                schema.name = name.to_string();
                schema
            }
            Some(Err(e)) => {
                tracing::warn!(collection = %name, "Ignoring unreadable collection schema: {e}");
                CollectionSchema::list(name)
            }
            None => CollectionSchema::list(name),
        };
        Self {
            schema,
            entries: listing.entries,
            revision: listing.revision,
        }
    }

    /// Content files whose stem is a usable slug, with their slug and format.
    fn content_files(&self) -> impl Iterator<Item = (&Entry, &str, ContentFormat)> {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::File)
            .filter_map(|e| {
                let (stem, format) = ContentFormat::from_file_name(&e.name)?;
                if validate_slug("Slug", stem).is_err() {
                    tracing::debug!(file = %e.name, "Skipping content file without a valid slug");
                    return None;
                }
                Some((e, stem, format))
            })
    }

    /// The file holding `slug`: exact stem, `.md`/`.mdx` in any case.
    pub fn document_entry(&self, slug: &str) -> Option<&Entry> {
        self.content_files()
            .find(|(_, stem, _)| *stem == slug)
            .map(|(entry, _, _)| entry)
    }

    /// The document at `slug`, if its text was part of the listing.
    pub fn document(&self, slug: &str) -> Option<Document> {
        let (entry, stem, format) = self.content_files().find(|(_, stem, _)| *stem == slug)?;
        let text = entry.contents.as_deref()?;
        Some(build_document(&self.schema, stem, format, text))
    }

    /// Every document whose text was part of the listing.
    pub fn documents(&self) -> Vec<Document> {
        self.content_files()
            .filter_map(|(entry, stem, format)| {
                let text = entry.contents.as_deref()?;
                Some(build_document(&self.schema, stem, format, text))
            })
            .collect()
    }

    /// Summaries of `documents()` in the schema's listing order.
    pub fn summaries(&self) -> Vec<DocumentSummary> {
        let mut summaries: Vec<DocumentSummary> =
            self.documents().iter().map(Document::summary).collect();
        self.schema.sort(&mut summaries);
        summaries
    }
}

/// Storage backend for collections, documents and media.
///
/// Implementors provide the primitives; the provided methods are the
/// operations the resolver and API use.
#[async_trait]
pub trait ContentStore: Send + Sync {
    fn layout(&self) -> &ContentLayout;

    /// A store acting with the given user token. The local store ignores it.
    fn with_credentials(&self, token: &AccessToken) -> Arc<dyn ContentStore>;

    /// Entries of `dir` with the requested file texts, in one round trip.
    /// `None` when the directory does not exist.
    async fn list_entries(
        &self,
        dir: &str,
        contents: Contents<'_>,
    ) -> Result<Option<Listing>, AppError>;

    async fn commit(&self, changes: ChangeSet) -> Result<(), AppError>;

    /// A collection directory with its schema and the requested file
    /// texts, in one listing. A directory without `schema.json` is a plain
    /// list collection; a missing directory is `None`.
    async fn open_collection(
        &self,
        name: &str,
        contents: Contents<'_>,
    ) -> Result<Option<CollectionSnapshot>, AppError> {
        if validate_slug("Collection", name).is_err() {
            return Ok(None);
        }
        let dir = self.layout().collection_dir(name);
        let listing = match contents {
            Contents::All => self.list_entries(&dir, Contents::All).await?,
            Contents::Names => {
                self.list_entries(&dir, Contents::Only(&[SCHEMA_FILE.to_string()]))
                    .await?
            }
            Contents::Only(names) => {
                let mut wanted = Vec::with_capacity(names.len() + 1);
                wanted.push(SCHEMA_FILE.to_string());
                wanted.extend_from_slice(names);
                self.list_entries(&dir, Contents::Only(&wanted)).await?
            }
        };
        Ok(listing.map(|listing| CollectionSnapshot::from_listing(name, listing)))
    }

    /// All collections: every directory under the content base.
    async fn list_collections(&self) -> Result<Vec<CollectionSchema>, AppError> {
        let Some(listing) = self.list_entries(&self.layout().base, Contents::Names).await? else {
            return Ok(Vec::new());
        };
        let mut schemas = Vec::new();
        for entry in listing.entries.iter().filter(|e| e.kind == EntryKind::Dir) {
            if let Some(schema) = self.get_collection(&entry.name).await? {
                schemas.push(schema);
            }
        }
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemas)
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionSchema>, AppError> {
        Ok(self
            .open_collection(name, Contents::Names)
            .await?
            .map(|snapshot| snapshot.schema))
    }

    /// Create or replace a collection's `schema.json`.
    async fn write_collection(&self, schema: &CollectionSchema) -> Result<(), AppError> {
        validate_slug("Collection", &schema.name)?;
        let issues = schema.check();
        if let Some(issue) = issues.first() {
            return Err(AppError::BadRequest(format!(
                "Invalid schema field '{}': {}",
                issue.field, issue.message
            )));
        }
        let json = serde_json::to_string_pretty(schema)
            .map_err(|e| AppError::Internal(format!("Failed to serialize schema: {e}")))?;
        let changes = ChangeSet::new(format!("Update collection {}", schema.name))
            .add(self.layout().schema_path(&schema.name), json);
        self.commit(changes).await
    }

    /// Remove a collection with every file under it, nested directories
    /// included. Returns whether it existed.
    async fn delete_collection(&self, name: &str) -> Result<bool, AppError> {
        validate_slug("Collection", name)?;
        let dir = self.layout().collection_dir(name);
        let Some(listing) = self.list_entries(&dir, Contents::Names).await? else {
            return Ok(false);
        };

        let mut changes = ChangeSet::new(format!("Delete collection {name}")).at(listing.revision);
        let mut pending = vec![(dir, listing.entries)];
        while let Some((current, entries)) = pending.pop() {
            for entry in entries {
                let path = join(&current, &entry.name);
                match entry.kind {
                    EntryKind::File => changes = changes.delete(path),
                    EntryKind::Dir => {
                        if let Some(nested) = self.list_entries(&path, Contents::Names).await? {
                            pending.push((path, nested.entries));
                        }
                    }
                }
            }
        }

        if !changes.is_empty() {
            self.commit(changes).await?;
        }
        Ok(true)
    }

    /// Create or overwrite a document in `collection`. With `previous_slug`
    /// set to a different slug, the file is moved in the same change set.
    ///
    /// Validation issues do not block the write; they come back on the
    /// returned document.
    async fn write_document(
        &self,
        collection: &CollectionSnapshot,
        slug: &str,
        front_matter: FrontMatter,
        body: &str,
        previous_slug: Option<&str>,
    ) -> Result<Document, AppError> {
        let schema = &collection.schema;
        validate_slug("Slug", slug)?;
        if let Some(fixed) = schema.singleton_slug() {
            if slug != fixed {
                return Err(AppError::BadRequest(format!(
                    "Collection '{}' holds a single document with slug '{fixed}'",
                    schema.name
                )));
            }
        }

        let layout = self.layout();
        let dir = layout.collection_dir(&schema.name);
        let previous = previous_slug.filter(|p| *p != slug);
        let existing = collection.document_entry(slug).map(|e| e.name.clone());

        let mut changes = ChangeSet::new(format!("Update {}/{slug}", schema.name))
            .at(collection.revision.clone());
        let format = match previous {
            Some(old_slug) => {
                validate_slug("Slug", old_slug)?;
                if existing.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "A document with slug '{slug}' already exists"
                    )));
                }
                let old_name = collection
                    .document_entry(old_slug)
                    .map(|e| e.name.clone())
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Document '{}/{old_slug}'", schema.name))
                    })?;
                changes.message = format!("Rename {}/{old_slug} to {slug}", schema.name);
                changes = changes.delete(join(&dir, &old_name));
                format_of(&old_name)
            }
            None => existing.as_deref().map(format_of).unwrap_or_default(),
        };

        let path = match (&existing, previous) {
            (Some(name), None) => join(&dir, name),
            _ => layout.document_path(&schema.name, slug, format),
        };
        let contents = frontmatter::serialize(&front_matter, body)?;
        changes.additions.insert(
            0,
            FileAddition {
                path,
                contents: contents.into_bytes(),
            },
        );
        self.commit(changes).await?;

        let issues = schema.validate(&front_matter);
        Ok(Document {
            collection: schema.name.clone(),
            slug: slug.to_string(),
            format,
            front_matter,
            body: body.to_string(),
            issues,
        })
    }

    /// Returns whether the document existed.
    async fn delete_document(
        &self,
        collection: &CollectionSnapshot,
        slug: &str,
    ) -> Result<bool, AppError> {
        validate_slug("Slug", slug)?;
        let Some(entry) = collection.document_entry(slug) else {
            return Ok(false);
        };
        let name = &collection.schema.name;
        let path = join(&self.layout().collection_dir(name), &entry.name);
        let changes = ChangeSet::new(format!("Delete {name}/{slug}"))
            .delete(path)
            .at(collection.revision.clone());
        self.commit(changes).await?;
        Ok(true)
    }

    /// Store an uploaded file under the media path and return its public URL.
    async fn upload_media(&self, original_name: &str, data: Vec<u8>) -> Result<String, AppError> {
        let sanitized: String = original_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        let name = format!("{}_{sanitized}", Utc::now().timestamp_millis());
        let layout = self.layout();
        let changes =
            ChangeSet::new(format!("Upload media {name}")).add(layout.media_file(&name), data);
        self.commit(changes).await?;
        Ok(layout.media_public_url(&name))
    }
}

fn format_of(name: &str) -> ContentFormat {
    ContentFormat::from_file_name(name)
        .map(|(_, format)| format)
        .unwrap_or_default()
}

/// Parse file text into a validated document. Broken front-matter is an
/// issue on the document, not an error.
fn build_document(
    schema: &CollectionSchema,
    slug: &str,
    format: ContentFormat,
    text: &str,
) -> Document {
    let parsed = frontmatter::parse(text);
    let mut issues = schema.validate(&parsed.front_matter);
    if let Some(error) = parsed.error {
        issues.insert(0, FieldIssue::new("frontMatter", error));
    }
    Document {
        collection: schema.name.clone(),
        slug: slug.to_string(),
        format,
        front_matter: parsed.front_matter,
        body: parsed.body,
        issues,
    }
}
