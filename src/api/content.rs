use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::middleware::CurrentUser;
use crate::content::models::{Document, DocumentSummary, FrontMatter};
use crate::content::schema::CollectionSchema;
use crate::error::AppError;
use crate::resolver::{render_html, Audience, Resolved};
use crate::state::AppState;

/// Body of a document write.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    pub front_matter: FrontMatter,
    #[serde(default)]
    pub body: String,
    /// Set when the slug changed since the document was loaded.
    #[serde(default)]
    pub previous_slug: Option<String>,
}

/// A document together with its sanitized HTML rendering.
#[derive(Debug, Serialize)]
pub struct RenderedDocument {
    #[serde(flatten)]
    pub document: Document,
    pub html: String,
}

impl From<Document> for RenderedDocument {
    fn from(document: Document) -> Self {
        let html = render_html(&document);
        Self { document, html }
    }
}

fn collection_not_found(collection: &str) -> AppError {
    AppError::NotFound(format!("Collection '{collection}'"))
}

fn document_not_found(collection: &str, slug: &str) -> AppError {
    AppError::NotFound(format!("Document '{collection}/{slug}'"))
}

// -- Admin API (session required) --

/// `GET /api/outstatic/collections`
pub async fn list_collections_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<Vec<CollectionSchema>>, AppError> {
    let collections = state.resolver.for_session(&session).list_collections().await?;
    Ok(Json(collections))
}

/// `GET /api/outstatic/collections/{collection}`
pub async fn get_collection_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(collection): Path<String>,
) -> Result<Json<CollectionSchema>, AppError> {
    state
        .resolver
        .for_session(&session)
        .get_collection(&collection)
        .await?
        .map(Json)
        .ok_or_else(|| collection_not_found(&collection))
}

/// `PUT /api/outstatic/collections/{collection}`
pub async fn put_collection_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(collection): Path<String>,
    Json(schema): Json<CollectionSchema>,
) -> Result<Json<CollectionSchema>, AppError> {
    let schema = state
        .resolver
        .for_session(&session)
        .save_collection(&collection, schema)
        .await?;
    Ok(Json(schema))
}

/// `DELETE /api/outstatic/collections/{collection}`
pub async fn delete_collection_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(collection): Path<String>,
) -> Result<StatusCode, AppError> {
    if state
        .resolver
        .for_session(&session)
        .delete_collection(&collection)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(collection_not_found(&collection))
    }
}

/// `GET /api/outstatic/collections/{collection}/documents`
///
/// Front-matter only, drafts and invalid documents included.
pub async fn list_documents_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(collection): Path<String>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    match state
        .resolver
        .for_session(&session)
        .resolve(&collection, None, Audience::Admin)
        .await?
    {
        Some(Resolved::List { documents, .. }) => Ok(Json(documents)),
        Some(Resolved::Document { document }) => Ok(Json(vec![document.summary()])),
        None => Err(collection_not_found(&collection)),
    }
}

/// `POST /api/outstatic/collections/{collection}/documents`
///
/// Creates a document whose slug is derived from its title.
pub async fn create_document_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(collection): Path<String>,
    Json(input): Json<DocumentInput>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let document = state
        .resolver
        .for_session(&session)
        .create_document(&collection, input.front_matter, &input.body)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// `GET /api/outstatic/collections/{collection}/documents/{slug}`
pub async fn get_document_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((collection, slug)): Path<(String, String)>,
) -> Result<Json<Document>, AppError> {
    match state
        .resolver
        .for_session(&session)
        .resolve(&collection, Some(&slug), Audience::Admin)
        .await?
    {
        Some(Resolved::Document { document }) => Ok(Json(document)),
        _ => Err(document_not_found(&collection, &slug)),
    }
}

/// `PUT /api/outstatic/collections/{collection}/documents/{slug}`
///
/// Creates or overwrites. Validation issues are returned, not rejected.
pub async fn put_document_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((collection, slug)): Path<(String, String)>,
    Json(input): Json<DocumentInput>,
) -> Result<Json<Document>, AppError> {
    let document = state
        .resolver
        .for_session(&session)
        .save_document(
            &collection,
            &slug,
            input.front_matter,
            &input.body,
            input.previous_slug.as_deref(),
        )
        .await?;
    Ok(Json(document))
}

/// `DELETE /api/outstatic/collections/{collection}/documents/{slug}`
pub async fn delete_document_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((collection, slug)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if state
        .resolver
        .for_session(&session)
        .delete_document(&collection, &slug)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(document_not_found(&collection, &slug))
    }
}

// -- Public API (published, valid content only) --

/// `GET /api/outstatic/content/{collection}`
///
/// A list collection answers with summaries, a singleton with its document.
pub async fn public_collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let value = match state
        .resolver
        .resolve(&collection, None, Audience::Public)
        .await?
    {
        Some(Resolved::List { documents, .. }) => serde_json::to_value(documents),
        Some(Resolved::Document { document }) => {
            serde_json::to_value(RenderedDocument::from(document))
        }
        None => return Err(collection_not_found(&collection)),
    }
    .map_err(|e| AppError::Internal(format!("Failed to serialize content: {e}")))?;
    Ok(Json(value))
}

/// `GET /api/outstatic/content/{collection}/{slug}`
pub async fn public_document_handler(
    State(state): State<AppState>,
    Path((collection, slug)): Path<(String, String)>,
) -> Result<Json<RenderedDocument>, AppError> {
    state
        .resolver
        .get_document(&collection, &slug)
        .await?
        .map(|document| Json(RenderedDocument::from(document)))
        .ok_or_else(|| document_not_found(&collection, &slug))
}
