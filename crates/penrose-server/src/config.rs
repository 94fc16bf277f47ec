//! Configuration management for the Penrose server.
//!
//! Configuration is assembled from, in increasing precedence:
//! 1. Default values
//! 2. A YAML configuration file (optional)
//! 3. Environment variables with the `PENROSE_` prefix (a `.env` file is
//!    loaded into the environment first, if present)

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use penrose_tap::TapClientConfig;
use penrose_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};

use crate::tracing_config::{TracingConfig, TracingFormat};

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Result store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Gaia TAP service
    #[serde(default)]
    pub tap: TapConfig,

    /// Background job tracker
    #[serde(default)]
    pub tracker: TrackerSettings,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_address")]
    pub address: String,

    /// Comma-separated allowed CORS origins, or `*`
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Optional bearer token required on job and exoplanet routes
    #[serde(default)]
    pub api_key: Option<String>,

    /// Time allowed for in-flight requests and the tracker to wind down
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("cors_origins", &self.cors_origins)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("shutdown_timeout_seconds", &self.shutdown_timeout_seconds)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            cors_origins: default_cors_origins(),
            api_key: None,
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

/// Result store backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend type: "memory" or "sqlite"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Database file for the sqlite backend
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

/// Gaia TAP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Service base URL
    #[serde(default = "default_tap_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            base_url: default_tap_base_url(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// Background tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Delay between tracker cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Jobs checked concurrently within one cycle
    #[serde(default = "default_max_concurrent_polls")]
    pub max_concurrent_polls: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_concurrent_polls: default_max_concurrent_polls(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_tap_base_url() -> String {
    penrose_tap::BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_concurrent_polls() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.as_ref().display())))?;

        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml_ng::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load .env file if it exists
    /// 2. Load from file if provided, otherwise defaults
    /// 3. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        let config = config.merge_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `PENROSE_*` overrides.
    ///
    /// Only variables that `lookup` returns override the current values.
    /// Numeric variables that fail to parse are ignored.
    pub fn merge_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(v) = lookup("PENROSE_ADDRESS") {
            self.server.address = v;
        }
        if let Some(v) = lookup("PENROSE_CORS_ORIGINS") {
            self.server.cors_origins = v;
        }
        if let Some(v) = lookup("PENROSE_API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(val) = lookup("PENROSE_SHUTDOWN_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.server.shutdown_timeout_seconds = val;
        }

        // Storage
        if let Some(v) = lookup("PENROSE_STORAGE_BACKEND") {
            self.storage.backend = v;
        }
        if let Some(v) = lookup("PENROSE_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(v));
        }

        // TAP
        if let Some(v) = lookup("PENROSE_TAP_BASE_URL") {
            self.tap.base_url = v;
        }
        if let Some(val) = lookup("PENROSE_TAP_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.tap.request_timeout_seconds = val;
        }
        if let Some(val) = lookup("PENROSE_TAP_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.tap.connect_timeout_seconds = val;
        }

        // Tracker
        if let Some(val) = lookup("PENROSE_POLL_INTERVAL").and_then(|v| v.parse().ok()) {
            self.tracker.poll_interval_secs = val;
        }
        if let Some(val) = lookup("PENROSE_MAX_CONCURRENT_POLLS").and_then(|v| v.parse().ok()) {
            self.tracker.max_concurrent_polls = val;
        }

        // Logging
        if let Some(v) = lookup("PENROSE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("PENROSE_LOG_FORMAT") {
            self.logging.format = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_address()?;

        if self.server.api_key.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(
                "api_key must not be empty; omit the field to disable authentication".to_string(),
            ));
        }

        match self.storage.backend.as_str() {
            "memory" => {}
            "sqlite" => {
                if self.storage.path.is_none() {
                    return Err(ConfigError::ValidationError(
                        "storage.path is required for the sqlite backend".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown storage backend: {other}"
                )));
            }
        }

        if !(self.tap.base_url.starts_with("http://") || self.tap.base_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid TAP base URL: {}",
                self.tap.base_url
            )));
        }
        if self.tap.request_timeout_seconds == 0 || self.tap.connect_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "TAP timeouts must be greater than 0".to_string(),
            ));
        }

        if self.tracker.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.tracker.max_concurrent_polls == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrent_polls must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        Ok(())
    }

    /// Get the parsed listen address.
    pub fn server_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.address.parse().map_err(|_| {
            ConfigError::ValidationError(format!("Invalid server address: {}", self.server.address))
        })
    }

    /// Settings for the Gaia TAP client.
    pub fn tap_client_config(&self) -> TapClientConfig {
        TapClientConfig {
            base_url: self.tap.base_url.clone(),
            request_timeout: Duration::from_secs(self.tap.request_timeout_seconds),
            connect_timeout: Duration::from_secs(self.tap.connect_timeout_seconds),
            ..TapClientConfig::default()
        }
    }

    /// Settings for the background tracker.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_secs(self.tracker.poll_interval_secs),
            max_concurrent_polls: self.tracker.max_concurrent_polls,
        }
    }

    /// Settings for the global tracing subscriber.
    pub fn tracing_config(&self) -> TracingConfig {
        let format = match self.logging.format.as_str() {
            "json" => TracingFormat::Json,
            _ => TracingFormat::Console,
        };
        TracingConfig::new(self.logging.level.clone(), format)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_seconds)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.address, "0.0.0.0:8080");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.tap.base_url, "https://gea.esac.esa.int");
        assert_eq!(config.tracker.poll_interval_secs, 5);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            "storage:\n  backend: sqlite\n  path: /var/lib/penrose/penrose.db\ntracker:\n  poll_interval_secs: 10\n",
        )
        .unwrap();

        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(
            config.storage.path.as_deref(),
            Some(Path::new("/var/lib/penrose/penrose.db"))
        );
        assert_eq!(config.tracker.poll_interval_secs, 10);
        assert_eq!(config.tracker.max_concurrent_polls, 4);
        assert_eq!(config.server.address, "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = Config::from_yaml("server: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let config = Config::default().merge_env(env(&[
            ("PENROSE_ADDRESS", "127.0.0.1:9000"),
            ("PENROSE_API_KEY", "secret"),
            ("PENROSE_POLL_INTERVAL", "2"),
            ("PENROSE_MAX_CONCURRENT_POLLS", "not-a-number"),
            ("PENROSE_LOG_FORMAT", "json"),
        ]));

        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.server.api_key.as_deref(), Some("secret"));
        assert_eq!(config.tracker.poll_interval_secs, 2);
        assert_eq!(config.tracker.max_concurrent_polls, 4);
        assert_eq!(config.tracing_config().format, TracingFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.storage.backend = "cosmos".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.backend = "sqlite".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tap.base_url = "ftp://gea.esac.esa.int".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tracker.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.api_key = Some(String::new());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = Config::default();
        config.server.api_key = Some("hunter2".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_derived_client_settings() {
        let mut config = Config::default();
        config.tap.request_timeout_seconds = 30;
        config.tracker.poll_interval_secs = 7;

        assert_eq!(config.tap_client_config().request_timeout, Duration::from_secs(30));
        assert_eq!(config.tracker_config().poll_interval, Duration::from_secs(7));
        assert_eq!(config.server_address().unwrap().port(), 8080);
    }
}
