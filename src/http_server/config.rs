//! HTTP Server Configuration
//!
//! Bind address, public URL and the CORS origin.

use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL of the API, reported at start-up
    #[serde(default)]
    pub application_url: Option<String>,

    /// Allowed CORS origin. Credentials are allowed, so this cannot be `*`.
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allow_origin() -> String {
    "http://localhost:3000".to_string()
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            application_url: None,
            allow_origin: default_allow_origin(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL clients use to reach the API
    pub fn public_url(&self) -> String {
        match &self.application_url {
            Some(url) => url.clone(),
            None => format!("http://{}", self.socket_addr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.allow_origin, "http://localhost:3000");
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig::with_port(9090);
        assert_eq!(config.socket_addr(), "0.0.0.0:9090");
        assert_eq!(config.public_url(), "http://0.0.0.0:9090");
    }
}
