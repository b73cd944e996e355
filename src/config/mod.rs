//! # Configuration
//!
//! Loaded from a JSON file, then overridden from `FEEDLINE_*` environment
//! variables, then validated. Every field has a default so an empty
//! object is a valid in-memory configuration.

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::http_server::HttpServerConfig;

/// Which family of backends to run with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Everything in process; state is lost on restart
    #[default]
    InMemory,
    /// Feeds as JSON documents on disk, posts in memory
    Document,
    /// MySQL stores and NATS JetStream messaging
    Persistent,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inmemory" => Ok(Mode::InMemory),
            "document" => Ok(Mode::Document),
            "persistent" => Ok(Mode::Persistent),
            other => Err(format!("{:?} is not a valid mode", other)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::InMemory => "inmemory",
            Mode::Document => "document",
            Mode::Persistent => "persistent",
        };
        write!(f, "{}", name)
    }
}

/// Message transport selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Discard everything; fan-out disabled
    Null,
    /// In-process broker
    Channel,
    /// NATS JetStream
    Nats,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Null => "null",
            TransportKind::Channel => "channel",
            TransportKind::Nats => "nats",
        };
        write!(f, "{}", name)
    }
}

/// Backing store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// MySQL URL, required in persistent mode
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Directory for the document backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/feeds")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// When false the null transport is used regardless of mode
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit transport; defaults from the mode when absent
    #[serde(default)]
    pub transport: Option<TransportKind>,

    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream holding every topic
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    /// Nacks tolerated per message before it is dropped
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
}

fn default_true() -> bool {
    true
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_stream_name() -> String {
    "FEEDLINE".to_string()
}

fn default_max_redeliveries() -> u32 {
    5
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: None,
            nats_url: default_nats_url(),
            stream_name: default_stream_name(),
            max_redeliveries: default_max_redeliveries(),
        }
    }
}

impl MessagingConfig {
    /// Transport actually used for the given mode
    pub fn transport_kind(&self, mode: Mode) -> TransportKind {
        if !self.enabled {
            return TransportKind::Null;
        }
        match (self.transport, mode) {
            (Some(kind), _) => kind,
            (None, Mode::Persistent) => TransportKind::Nats,
            (None, _) => TransportKind::Channel,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// When false every request acts as the anonymous user
    #[serde(default)]
    pub enable: bool,

    /// HS256 signing secret for identity tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `feedline=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub feeds_storage: StorageConfig,

    #[serde(default)]
    pub posts_storage: StorageConfig,

    #[serde(default)]
    pub messaging: MessagingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Environment variables applied on top of the file
    #[serde(skip)]
    pub overrides: Vec<String>,
}

fn parse_bool(variable: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            variable: variable.to_string(),
            value: value.to_string(),
        }),
    }
}

impl Config {
    /// Load configuration from file, apply environment overrides, validate
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config = Self::from_json(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `FEEDLINE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let mut get = |name: &str| {
            let value = lookup(name).filter(|v| !v.is_empty());
            if value.is_some() {
                applied.push(name.to_string());
            }
            value
        };

        if let Some(value) = get("FEEDLINE_MODE") {
            self.mode = value.parse().map_err(|_| ConfigError::InvalidOverride {
                variable: "FEEDLINE_MODE".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = get("FEEDLINE_API_URL") {
            self.http.application_url = Some(value);
        }
        if let Some(value) = get("FEEDLINE_HTTP_PORT") {
            self.http.port = value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                variable: "FEEDLINE_HTTP_PORT".to_string(),
                value: value.clone(),
            })?;
        }
        if let Some(value) = get("FEEDLINE_FEEDS_CONNECTION_STRING") {
            self.feeds_storage.connection_string = Some(value);
        }
        if let Some(value) = get("FEEDLINE_POSTS_CONNECTION_STRING") {
            self.posts_storage.connection_string = Some(value);
        }
        if let Some(value) = get("FEEDLINE_NATS_URL") {
            self.messaging.nats_url = value;
        }
        if let Some(value) = get("FEEDLINE_AUTH_ENABLE") {
            self.auth.enable = parse_bool("FEEDLINE_AUTH_ENABLE", &value)?;
        }
        if let Some(value) = get("FEEDLINE_JWT_SECRET") {
            self.auth.jwt_secret = Some(value);
        }
        if let Some(value) = get("FEEDLINE_ALLOW_ORIGIN") {
            self.http.allow_origin = value;
        }
        if let Some(value) = get("FEEDLINE_LOG_LEVEL") {
            self.log.level = value;
        }

        self.overrides.extend(applied);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.http.allow_origin.trim() == "*" {
            return Err(ConfigError::Invalid(
                "http.allow_origin cannot be '*' when credentials are allowed".into(),
            ));
        }

        if self.mode == Mode::Persistent {
            if self.feeds_storage.connection_string.is_none() {
                return Err(ConfigError::Invalid(
                    "feeds_storage.connection_string is required in persistent mode".into(),
                ));
            }
            if self.posts_storage.connection_string.is_none() {
                return Err(ConfigError::Invalid(
                    "posts_storage.connection_string is required in persistent mode".into(),
                ));
            }
        }

        if self.messaging.transport_kind(self.mode) == TransportKind::Nats {
            if self.messaging.nats_url.trim().is_empty() {
                return Err(ConfigError::Invalid("messaging.nats_url must not be empty".into()));
            }
            if self.messaging.stream_name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "messaging.stream_name must not be empty".into(),
                ));
            }
        }

        if self.auth.enable
            && self
                .auth
                .jwt_secret
                .as_deref()
                .map(str::is_empty)
                .unwrap_or(true)
        {
            return Err(ConfigError::Invalid(
                "auth.jwt_secret is required when authentication is enabled".into(),
            ));
        }

        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Invalid("log.level must not be empty".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_object_is_inmemory_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.mode, Mode::InMemory);
        assert_eq!(config.messaging.transport_kind(config.mode), TransportKind::Channel);
        assert!(!config.auth.enable);
        config.validate().unwrap();
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(" InMemory ".parse::<Mode>().unwrap(), Mode::InMemory);
        assert_eq!("persistent".parse::<Mode>().unwrap(), Mode::Persistent);
        assert!("cloud".parse::<Mode>().is_err());

        let config = Config::from_json(r#"{"mode": "document"}"#).unwrap();
        assert_eq!(config.mode, Mode::Document);
        assert!(Config::from_json(r#"{"mode": "bogus"}"#).is_err());
    }

    #[test]
    fn test_transport_kind_selection() {
        let mut messaging = MessagingConfig::default();
        assert_eq!(messaging.transport_kind(Mode::Persistent), TransportKind::Nats);
        assert_eq!(messaging.transport_kind(Mode::Document), TransportKind::Channel);

        messaging.transport = Some(TransportKind::Channel);
        assert_eq!(messaging.transport_kind(Mode::Persistent), TransportKind::Channel);

        messaging.enabled = false;
        assert_eq!(messaging.transport_kind(Mode::Persistent), TransportKind::Null);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("FEEDLINE_MODE", "persistent"),
                ("FEEDLINE_FEEDS_CONNECTION_STRING", "mysql://root@db/feeds"),
                ("FEEDLINE_POSTS_CONNECTION_STRING", "mysql://root@db/posts"),
                ("FEEDLINE_AUTH_ENABLE", "true"),
                ("FEEDLINE_JWT_SECRET", "secret"),
                ("FEEDLINE_ALLOW_ORIGIN", "https://app.example.com"),
                ("FEEDLINE_HTTP_PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.mode, Mode::Persistent);
        assert_eq!(config.http.port, 9000);
        assert!(config.auth.enable);
        assert_eq!(config.http.allow_origin, "https://app.example.com");
        assert_eq!(config.overrides.len(), 7);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("FEEDLINE_MODE", "")])).unwrap();
        assert_eq!(config.mode, Mode::InMemory);
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(env(&[("FEEDLINE_AUTH_ENABLE", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidOverride { .. })));
    }

    #[test]
    fn test_validation_failures() {
        let persistent = Config {
            mode: Mode::Persistent,
            ..Default::default()
        };
        assert!(persistent.validate().is_err());

        let mut auth = Config::default();
        auth.auth.enable = true;
        assert!(auth.validate().is_err());

        let mut wildcard = Config::default();
        wildcard.http.allow_origin = "*".to_string();
        assert!(wildcard.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = Config::load(&temp.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("feedline.json");
        fs::write(
            &path,
            r#"{
                "mode": "document",
                "http": { "port": 8181 },
                "feeds_storage": { "data_dir": "/tmp/feeds" },
                "messaging": { "max_redeliveries": 2 },
                "log": { "level": "debug", "format": "pretty" }
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.http.port, 8181);
        assert_eq!(config.feeds_storage.data_dir, PathBuf::from("/tmp/feeds"));
        assert_eq!(config.messaging.max_redeliveries, 2);
        assert_eq!(config.log.format, LogFormat::Pretty);
    }
}
