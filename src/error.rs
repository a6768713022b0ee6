use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, expired, or rejected session / token.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The git host refused the operation for this token.
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Network or git host failure. The caller may offer a retry.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The git host answered with an error we cannot classify further.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A multi-file change stopped midway. `applied` lists the paths that
    /// were already written or removed.
    #[error("Partial write: {failed} failed after {} applied change(s): {reason}", applied.len())]
    PartialWrite {
        applied: Vec<String>,
        failed: String,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(AppError::Transient("timeout".into()).is_retryable());
        assert!(!AppError::Auth("nope".into()).is_retryable());
        assert!(!AppError::Upstream("bad query".into()).is_retryable());
    }

    #[test]
    fn test_partial_write_message() {
        let err = AppError::PartialWrite {
            applied: vec!["content/posts/new.md".into()],
            failed: "content/posts/old.md".into(),
            reason: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("content/posts/old.md"));
        assert!(msg.contains("1 applied"));
    }
}
