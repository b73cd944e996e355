//! # Transport Errors

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Message transport errors
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport was closed
    #[error("Transport closed")]
    Closed,

    /// Broker could not be reached at start-up
    #[error("Failed to connect to broker: {0}")]
    Connect(String),

    #[error("Failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Ack or nack could not be delivered to the broker
    #[error("Failed to acknowledge message {message_id}: {reason}")]
    Ack { message_id: String, reason: String },

    /// Event could not be serialized before publishing
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// Transport not compiled in
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            TransportError::Closed
            | TransportError::Connect(_)
            | TransportError::Unavailable(_) => 503,
            _ => 500,
        }
    }
}
