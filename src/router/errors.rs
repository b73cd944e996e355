//! # Router Errors

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for router lifecycle operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Router lifecycle errors
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// Handlers and middleware can only be added before `start`
    #[error("Router already started")]
    AlreadyStarted,

    /// A handler topic could not be subscribed
    #[error("Failed to subscribe handler {handler}: {source}")]
    Subscribe {
        handler: String,
        #[source]
        source: TransportError,
    },

    /// The wiring task ended without signalling readiness
    #[error("Router wiring aborted")]
    WiringAborted,

    #[error("Failed to close transport: {0}")]
    Shutdown(TransportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of a handler invocation that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Transient failure; the message is redelivered
    #[error("{0}")]
    Retryable(String),

    /// The message can never succeed; it is logged and acknowledged
    #[error("{0}")]
    Permanent(String),

    /// The handler panicked
    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Retryable(_))
    }
}
