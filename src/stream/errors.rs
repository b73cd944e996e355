//! # Live-Stream Errors

use thiserror::Error;

use crate::feed_store::FeedStoreError;
use crate::post_store::PostStoreError;
use crate::transport::TransportError;

/// Result type for live-stream operations
pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error(transparent)]
    FeedStore(#[from] FeedStoreError),

    #[error(transparent)]
    PostStore(#[from] PostStoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload could not be rendered as JSON
    #[error("Failed to serialize stream payload: {0}")]
    Serialize(String),
}

impl StreamError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StreamError::FeedStore(e) => e.status_code(),
            StreamError::PostStore(e) => e.status_code(),
            StreamError::Transport(e) => e.status_code(),
            StreamError::Serialize(_) => 500,
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Serialize(e.to_string())
    }
}
