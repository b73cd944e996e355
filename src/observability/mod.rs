//! # Observability
//!
//! Structured logging for the service. Every component logs through
//! `tracing`; this module installs the subscriber once at startup.
//!
//! The configured level is a default. `RUST_LOG`, when set, wins so that
//! individual modules can be turned up without touching the config file.

use thiserror::Error;
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// The level directive could not be parsed
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber was already installed
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Resolve the effective filter: `RUST_LOG` first, then the configured level
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, ObservabilityError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ObservabilityError::InvalidFilter(e.to_string())),
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt_layer::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt_layer::layer().with_target(true)).try_init(),
    };

    result.map_err(|_| ObservabilityError::AlreadyInitialized)
}
