use axum::extract::{Multipart, State};
use serde::Serialize;

use crate::auth::middleware::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Response from a successful media upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Public URL of the stored file.
    pub url: String,
}

/// Axum handler for `POST /api/outstatic/media`.
///
/// Accepts a multipart form with a single file field named "file" and
/// stores it under the media path of the repository.
pub async fn upload_media_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    mut multipart: Multipart,
) -> Result<axum::Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        check_image(&file_name, &content_type)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        let url = state
            .resolver
            .for_session(&session)
            .upload_media(&file_name, data.to_vec())
            .await?;
        tracing::info!(url = %url, bytes = data.len(), "Uploaded media");

        return Ok(axum::Json(UploadResponse { url }));
    }

    Err(AppError::BadRequest("No file field found in request".into()))
}

/// Media type served for each accepted image extension.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
];

/// Accept raster images whose extension agrees with the declared type.
/// The stored file is later served by extension, so the name decides.
fn check_image(file_name: &str, content_type: &str) -> Result<(), AppError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let Some((_, expected)) = IMAGE_TYPES.iter().find(|(ext, _)| *ext == extension) else {
        return Err(AppError::BadRequest(format!(
            "Only png, jpg, gif, webp and avif images are allowed, got '{file_name}'"
        )));
    };
    let declared = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if declared != *expected {
        return Err(AppError::BadRequest(format!(
            "'{file_name}' must be sent as {expected}, not {content_type}"
        )));
    }
    Ok(())
}
