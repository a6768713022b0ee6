use std::time::Duration;

use reqwest::StatusCode;

use crate::error::AppError;

/// GitHub rejects API requests without a User-Agent.
pub const USER_AGENT: &str = concat!("outstatic/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for the OAuth and GraphQL calls.
pub fn build_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Classify a transport-level failure. No retry happens here; the caller
/// decides whether to offer one.
pub fn transport_error(context: &str, err: reqwest::Error) -> AppError {
    AppError::Transient(format!("{context}: {err}"))
}

/// Classify a non-success HTTP status from the git host.
///
/// `rate_limited` is true when the response said the quota is exhausted
/// (GitHub answers 403 in that case).
pub fn status_error(context: &str, status: StatusCode, rate_limited: bool) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => {
            AppError::Auth(format!("{context}: the git host rejected the access token"))
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if rate_limited => {
            AppError::Transient(format!("{context}: rate limit exceeded"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            AppError::Transient(format!("{context}: rate limit exceeded"))
        }
        StatusCode::FORBIDDEN => AppError::Permission(format!("{context}: access denied")),
        StatusCode::NOT_FOUND => AppError::NotFound(context.to_string()),
        s if s.is_server_error() => AppError::Transient(format!("{context}: git host returned {s}")),
        s => AppError::Upstream(format!("{context}: git host returned {s}")),
    }
}

/// Whether GitHub's rate-limit header reports an exhausted quota.
pub fn is_rate_limited(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}
