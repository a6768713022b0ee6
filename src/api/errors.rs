use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// API-specific error wrapper that converts AppError into HTTP responses.
///
/// Internal details (storage paths, config problems) are logged, never sent.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Auth(msg) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": msg }),
            ),
            // Forbidden is indistinguishable from missing to the caller.
            AppError::Permission(msg) => {
                tracing::warn!("Permission denied by git host: {msg}");
                (
                    StatusCode::NOT_FOUND,
                    serde_json::json!({ "error": "Not found" }),
                )
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": format!("{msg} not found") }),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            AppError::Transient(msg) => {
                tracing::warn!("Transient failure: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    serde_json::json!({ "error": msg, "retryable": true }),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Git host error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    serde_json::json!({ "error": msg }),
                )
            }
            AppError::PartialWrite {
                applied,
                failed,
                reason,
            } => {
                tracing::error!(failed = %failed, applied = ?applied, "Partial write: {reason}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({
                        "error": "The change was only partially saved",
                        "applied": applied,
                        "failed": failed,
                    }),
                )
            }
            AppError::Storage(msg) | AppError::Config(msg) | AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
