//! # Codec Errors

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Event serialization errors
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Payload could not be parsed into the expected event
    #[error("Malformed {topic} payload in message {message_id}: {reason}")]
    Malformed {
        topic: &'static str,
        message_id: String,
        reason: String,
    },

    /// Event could not be serialized
    #[error("Failed to encode {topic} event: {reason}")]
    Encode { topic: &'static str, reason: String },
}
