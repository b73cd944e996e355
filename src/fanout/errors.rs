//! # Fan-out Errors

use thiserror::Error;

use crate::events::CodecError;
use crate::feed_store::FeedStoreError;
use crate::router::HandlerError;

/// Result type for fan-out handlers
pub type FanoutResult<T> = Result<T, FanoutError>;

#[derive(Debug, Clone, Error)]
pub enum FanoutError {
    /// Inbound payload could not be decoded, or outbound could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Feed store failure: {0}")]
    Store(#[from] FeedStoreError),
}

impl FanoutError {
    /// Store failures may succeed on redelivery; codec failures never will
    pub fn is_retryable(&self) -> bool {
        matches!(self, FanoutError::Store(_))
    }
}

impl From<FanoutError> for HandlerError {
    fn from(e: FanoutError) -> Self {
        if e.is_retryable() {
            HandlerError::Retryable(e.to_string())
        } else {
            HandlerError::Permanent(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let store = FanoutError::Store(FeedStoreError::Io("disk full".into()));
        assert!(store.is_retryable());
        assert!(HandlerError::from(store).is_retryable());

        let malformed = FanoutError::Codec(CodecError::Malformed {
            topic: "post-created",
            message_id: "m1".into(),
            reason: "expected value".into(),
        });
        assert!(!malformed.is_retryable());
        assert!(matches!(HandlerError::from(malformed), HandlerError::Permanent(_)));
    }
}
