use std::sync::Arc;

use serde::Serialize;

use crate::auth::models::Session;
use crate::content::models::{slugify, validate_slug, Document, DocumentSummary, FrontMatter};
use crate::content::schema::CollectionSchema;
use crate::error::AppError;
use crate::rendering::markdown::render_markdown;
use crate::store::{document_file_names, CollectionSnapshot, ContentStore, Contents};

/// Who the content is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// The admin UI: drafts and invalid documents are visible, flagged.
    Admin,
    /// Public rendering: only valid, published documents exist.
    Public,
}

impl Audience {
    fn admits(self, valid_and_published: bool) -> bool {
        match self {
            Audience::Admin => true,
            Audience::Public => valid_and_published,
        }
    }
}

/// What a `(collection, slug?)` pair resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resolved {
    List {
        collection: CollectionSchema,
        documents: Vec<DocumentSummary>,
    },
    Document {
        document: Document,
    },
}

/// Entry point for host pages and the admin API: turns a collection and an
/// optional slug into content, applying schema validation and visibility.
#[derive(Clone)]
pub struct ContentResolver {
    store: Arc<dyn ContentStore>,
}

impl ContentResolver {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Resolver acting with the signed-in user's token.
    pub fn for_session(&self, session: &Session) -> Self {
        Self {
            store: self.store.with_credentials(&session.access_token),
        }
    }

    /// Resolve `collection` (and `slug`, if any). `None` means not found.
    ///
    /// Without a slug a list collection yields its documents in schema
    /// order and a singleton yields its one document. A singleton only
    /// answers to its fixed slug. Either way the store is read once.
    pub async fn resolve(
        &self,
        collection: &str,
        slug: Option<&str>,
        audience: Audience,
    ) -> Result<Option<Resolved>, AppError> {
        let snapshot = match slug {
            None => self.store.open_collection(collection, Contents::All).await?,
            Some(slug) if validate_slug("Slug", slug).is_ok() => {
                let names = document_file_names(slug);
                self.store
                    .open_collection(collection, Contents::Only(&names))
                    .await?
            }
            Some(_) => return Ok(None),
        };
        let Some(snapshot) = snapshot else {
            return Ok(None);
        };

        let slug = match (snapshot.schema.singleton_slug(), slug) {
            (Some(fixed), None) => fixed.to_string(),
            (Some(fixed), Some(requested)) if requested == fixed => fixed.to_string(),
            (Some(_), Some(_)) => return Ok(None),
            (None, Some(requested)) => requested.to_string(),
            (None, None) => {
                let mut documents = snapshot.summaries();
                documents.retain(|d| audience.admits(d.is_public()));
                return Ok(Some(Resolved::List {
                    collection: snapshot.schema,
                    documents,
                }));
            }
        };

        Ok(snapshot
            .document(&slug)
            .filter(|d| audience.admits(d.is_public()))
            .map(|document| Resolved::Document { document }))
    }

    /// Published, valid documents of a collection in listing order.
    /// An unknown collection has no documents.
    pub async fn get_documents(&self, collection: &str) -> Result<Vec<DocumentSummary>, AppError> {
        let Some(snapshot) = self.store.open_collection(collection, Contents::All).await? else {
            return Ok(Vec::new());
        };
        let mut documents = snapshot.summaries();
        documents.retain(|d| d.is_public());
        Ok(documents)
    }

    /// A published, valid document, or `None`.
    pub async fn get_document(
        &self,
        collection: &str,
        slug: &str,
    ) -> Result<Option<Document>, AppError> {
        match self.resolve(collection, Some(slug), Audience::Public).await? {
            Some(Resolved::Document { document }) => Ok(Some(document)),
            _ => Ok(None),
        }
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionSchema>, AppError> {
        self.store.list_collections().await
    }

    pub async fn get_collection(&self, name: &str) -> Result<Option<CollectionSchema>, AppError> {
        self.store.get_collection(name).await
    }

    /// Create or replace a collection schema. The name in the path wins
    /// over the one in the body.
    pub async fn save_collection(
        &self,
        name: &str,
        mut schema: CollectionSchema,
    ) -> Result<CollectionSchema, AppError> {
        schema.name = name.to_string();
        self.store.write_collection(&schema).await?;
        tracing::info!(collection = %name, "Saved collection schema");
        Ok(schema)
    }

    pub async fn delete_collection(&self, name: &str) -> Result<bool, AppError> {
        let deleted = self.store.delete_collection(name).await?;
        if deleted {
            tracing::info!(collection = %name, "Deleted collection");
        }
        Ok(deleted)
    }

    /// Write a document, moving it when `previous_slug` differs from `slug`.
    pub async fn save_document(
        &self,
        collection: &str,
        slug: &str,
        front_matter: FrontMatter,
        body: &str,
        previous_slug: Option<&str>,
    ) -> Result<Document, AppError> {
        let snapshot = self.require_collection(collection).await?;
        let document = self
            .store
            .write_document(&snapshot, slug, front_matter, body, previous_slug)
            .await?;
        tracing::info!(
            collection = %collection,
            slug = %slug,
            issues = document.issues.len(),
            "Saved document"
        );
        Ok(document)
    }

    /// Create a document whose slug is derived from its title.
    pub async fn create_document(
        &self,
        collection: &str,
        front_matter: FrontMatter,
        body: &str,
    ) -> Result<Document, AppError> {
        let snapshot = self.require_collection(collection).await?;
        let slug = match snapshot.schema.singleton_slug() {
            Some(fixed) => fixed.to_string(),
            None => slugify(&front_matter.title),
        };
        if slug.is_empty() {
            return Err(AppError::BadRequest(
                "A title with at least one letter or digit is needed to create a document".into(),
            ));
        }
        if snapshot.document_entry(&slug).is_some() {
            return Err(AppError::BadRequest(format!(
                "A document with slug '{slug}' already exists"
            )));
        }
        let document = self
            .store
            .write_document(&snapshot, &slug, front_matter, body, None)
            .await?;
        tracing::info!(collection = %collection, slug = %slug, "Created document");
        Ok(document)
    }

    pub async fn delete_document(&self, collection: &str, slug: &str) -> Result<bool, AppError> {
        let Some(snapshot) = self.store.open_collection(collection, Contents::Names).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete_document(&snapshot, slug).await?;
        if deleted {
            tracing::info!(collection = %collection, slug = %slug, "Deleted document");
        }
        Ok(deleted)
    }

    pub async fn upload_media(&self, file_name: &str, data: Vec<u8>) -> Result<String, AppError> {
        self.store.upload_media(file_name, data).await
    }

    async fn require_collection(&self, collection: &str) -> Result<CollectionSnapshot, AppError> {
        self.store
            .open_collection(collection, Contents::Names)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Collection '{collection}'")))
    }
}

/// Sanitized HTML of a document body.
pub fn render_html(document: &Document) -> String {
    render_markdown(&document.body)
}
