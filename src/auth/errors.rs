//! # Auth Errors
//!
//! Error types for request authentication.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Neither a bearer token nor an `id_token` cookie was sent
    #[error("Unauthorized: no identity token found")]
    MissingToken,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token signature")]
    InvalidSignature,

    /// Issuer or audience did not match configuration
    #[error("Token rejected: {0}")]
    InvalidClaims(String),

    /// Authentication is enabled without a usable secret
    #[error("Authentication misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Misconfigured(_) => 500,
            _ => 401,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), 401);
        assert_eq!(AuthError::MalformedToken.status_code(), 401);
        assert_eq!(AuthError::TokenExpired.status_code(), 401);
        assert_eq!(AuthError::Misconfigured("x".into()).status_code(), 500);
    }
}
