//! # Identity Tokens
//!
//! Stateless HS256 validation of identity tokens. Claims follow the
//! OpenID Connect profile names (`given_name`, `family_name`, ...).

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};
use crate::model::User;

/// Claims read from an identity token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default)]
    pub sub: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub given_name: String,

    #[serde(default)]
    pub family_name: String,

    #[serde(default)]
    pub picture: String,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

impl From<IdentityClaims> for User {
    fn from(claims: IdentityClaims) -> Self {
        User {
            first_name: claims.given_name,
            last_name: claims.family_name,
            email: claims.email,
            picture: claims.picture,
            is_anonymous: false,
        }
    }
}

/// Validates identity tokens against one shared secret
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a token and extract its claims
    pub fn validate_token(&self, token: &str) -> AuthResult<IdentityClaims> {
        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::InvalidIssuer => AuthError::InvalidClaims("issuer".into()),
                ErrorKind::InvalidAudience => AuthError::InvalidClaims("audience".into()),
                _ => AuthError::MalformedToken,
            })?;

        Ok(token_data.claims)
    }
}
