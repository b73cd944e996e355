//! # Authentication
//!
//! Resolves the calling [`User`] for write requests. With authentication
//! disabled every caller is anonymous; otherwise an identity token must
//! arrive as an `Authorization: Bearer` header or an `id_token` cookie.

mod errors;
mod jwt;

pub use errors::{AuthError, AuthResult};
pub use jwt::{IdentityClaims, JwtValidator};

use axum::http::{header, HeaderMap};

use crate::config::AuthConfig;
use crate::model::User;

/// Cookie carrying the identity token for browser clients
pub const ID_TOKEN_COOKIE: &str = "id_token";

#[derive(Debug, Clone)]
pub struct AuthValidator {
    jwt: Option<JwtValidator>,
    enabled: bool,
}

impl AuthValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let jwt = config.jwt_secret.as_deref().map(|secret| {
            JwtValidator::new(secret, config.issuer.as_deref(), config.audience.as_deref())
        });
        Self {
            jwt,
            enabled: config.enable,
        }
    }

    /// Validator that lets everyone through as anonymous
    pub fn disabled() -> Self {
        Self {
            jwt: None,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Identify the caller of a request
    pub fn validate(&self, headers: &HeaderMap) -> AuthResult<User> {
        if !self.enabled {
            return Ok(User::anonymous());
        }

        let jwt = self
            .jwt
            .as_ref()
            .ok_or_else(|| AuthError::Misconfigured("auth.jwt_secret is not set".into()))?;
        let token = bearer_token(headers)
            .or_else(|| cookie_value(headers, ID_TOKEN_COOKIE))
            .ok_or(AuthError::MissingToken)?;

        jwt.validate_token(&token).map(User::from)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test_secret_key_for_testing_only";

    fn enabled_config() -> AuthConfig {
        AuthConfig {
            enable: true,
            jwt_secret: Some(SECRET.to_string()),
            issuer: None,
            audience: None,
        }
    }

    fn token() -> String {
        let claims = json!({
            "given_name": "Alice",
            "family_name": "Liddell",
            "email": "alice@example.com",
            "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_disabled_is_anonymous() {
        let validator = AuthValidator::new(&AuthConfig::default());
        let user = validator.validate(&HeaderMap::new()).unwrap();
        assert!(user.is_anonymous);
        assert_eq!(user.display_name(), "anonymous");
    }

    #[test]
    fn test_missing_token() {
        let validator = AuthValidator::new(&enabled_config());
        let err = validator.validate(&HeaderMap::new()).unwrap_err();
        assert_eq!(err, AuthError::MissingToken);
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_bearer_token() {
        let validator = AuthValidator::new(&enabled_config());
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token())).unwrap(),
        );

        let user = validator.validate(&headers).unwrap();
        assert_eq!(user.display_name(), "Alice Liddell");
    }

    #[test]
    fn test_cookie_token() {
        let validator = AuthValidator::new(&enabled_config());
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; id_token={}", token())).unwrap(),
        );

        let user = validator.validate(&headers).unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_enabled_without_secret() {
        let validator = AuthValidator::new(&AuthConfig {
            enable: true,
            ..Default::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        assert!(matches!(
            validator.validate(&headers),
            Err(AuthError::Misconfigured(_))
        ));
    }
}
