//! # Configuration Errors

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    /// Environment variable with an unusable value
    #[error("Invalid value {value:?} for {variable}")]
    InvalidOverride { variable: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
