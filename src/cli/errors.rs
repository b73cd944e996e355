//! CLI-specific error types
//!
//! Every CLI error is fatal: `main` prints it and exits non-zero.

use thiserror::Error;

use crate::config::ConfigError;
use crate::feed_store::FeedStoreError;
use crate::observability::ObservabilityError;
use crate::post_store::PostStoreError;
use crate::router::RouterError;
use crate::transport::TransportError;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] ObservabilityError),

    #[error("Feed store failed to open: {0}")]
    FeedStore(#[from] FeedStoreError),

    #[error("Post store failed to open: {0}")]
    PostStore(#[from] PostStoreError),

    #[error("Transport failed to open: {0}")]
    Transport(#[from] TransportError),

    /// The router could not subscribe its handlers
    #[error("Router failed to start: {0}")]
    Router(#[from] RouterError),

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(String),

    #[error("HTTP server failed: {0}")]
    Serve(#[from] std::io::Error),
}
