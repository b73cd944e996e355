//! # Feed Store Errors
//!
//! Backend-specific failures are translated into this vocabulary at each
//! backend's boundary.

use thiserror::Error;

/// Result type for feed store operations
pub type FeedStoreResult<T> = Result<T, FeedStoreError>;

/// Feed store errors
#[derive(Debug, Clone, Error)]
pub enum FeedStoreError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Database or remote store failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// A stored feed could not be decoded
    #[error("Corrupt feed {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// Backend not compiled in or not reachable at start-up
    #[error("Feed store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedStoreError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            FeedStoreError::Unavailable(_) => 503,
            _ => 500,
        }
    }
}
