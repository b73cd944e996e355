//! # Post Store Errors

use thiserror::Error;

/// Result type for post store operations
pub type PostStoreResult<T> = Result<T, PostStoreError>;

/// Post store errors
#[derive(Debug, Clone, Error)]
pub enum PostStoreError {
    /// Database failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// A stored post could not be decoded
    #[error("Corrupt post {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Post store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PostStoreError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            PostStoreError::Unavailable(_) => 503,
            _ => 500,
        }
    }
}
