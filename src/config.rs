//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (DASHSTREAM_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [http]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [websocket]
//! max_message_size = 1048576
//! idle_timeout_secs = 300
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DASHSTREAM_HTTP__PORT=9000
//! DASHSTREAM_WEBSOCKET__RECEIVE_TIMEOUT_SECS=60
//! ```
//!
//! Configuration is read once at startup and never mutated afterwards.

use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::protocol::error::ServerError;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// HTTP server bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins (empty = same-origin only, unless cors_allow_all is true)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Explicitly allow all CORS origins (dev mode opt-in)
    #[serde(default)]
    pub cors_allow_all: bool,
}

/// Per-connection WebSocket policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Interval between server keep-alive pings in seconds. 0 = disabled.
    #[serde(default = "default_keep_alive_interval_secs")]
    pub keep_alive_interval_secs: u64,

    /// Size in bytes of each fragment handed to the reassembler
    #[serde(default = "default_receive_buffer_size")]
    pub receive_buffer_size: usize,

    /// Largest accepted message in bytes, after reassembly
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Upper bound for a single receive in seconds. 0 = disabled.
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,

    /// Close the connection after this long without a message. 0 = disabled.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Upper bound for the close handshake in seconds
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,

    /// Delay between pushed snapshots while streaming, in milliseconds
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,
}

/// Process shutdown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long each open connection gets to finish closing, in seconds
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Append logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<String>,
}

// Default value functions
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_keep_alive_interval_secs() -> u64 {
    30
}
fn default_receive_buffer_size() -> usize {
    16_384 // 16 KB
}
fn default_max_message_size() -> usize {
    1_048_576 // 1 MB
}
fn default_receive_timeout_secs() -> u64 {
    120
}
fn default_idle_timeout_secs() -> u64 {
    300 // 5 minutes
}
fn default_close_timeout_secs() -> u64 {
    5
}
fn default_stream_interval_ms() -> u64 {
    2_000
}
fn default_drain_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

/// `Some(duration)` unless the setting is 0
fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (DASHSTREAM_* prefix)
    pub fn load() -> Result<Self, ServerError> {
        let config: Config = Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("DASHSTREAM_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, ServerError> {
        let config: Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DASHSTREAM_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the connection core cannot run with
    pub fn validate(&self) -> Result<(), ServerError> {
        let ws = &self.websocket;
        if ws.receive_buffer_size == 0 {
            return Err(ServerError::invalid_config(
                "websocket.receive_buffer_size",
                "must be greater than 0",
            ));
        }
        if ws.max_message_size == 0 {
            return Err(ServerError::invalid_config(
                "websocket.max_message_size",
                "must be greater than 0",
            ));
        }
        if ws.receive_buffer_size > ws.max_message_size {
            return Err(ServerError::invalid_config(
                "websocket.receive_buffer_size",
                format!(
                    "{} exceeds max_message_size {}",
                    ws.receive_buffer_size, ws.max_message_size
                ),
            ));
        }
        if ws.stream_interval_ms == 0 {
            return Err(ServerError::invalid_config(
                "websocket.stream_interval_ms",
                "must be greater than 0",
            ));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ServerError::invalid_config(
                "logging.format",
                format!("unknown format '{}'", self.logging.format),
            ));
        }
        Ok(())
    }
}

impl WebSocketConfig {
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        non_zero_secs(self.keep_alive_interval_secs)
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.receive_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: Vec::new(),
            cors_allow_all: false,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            keep_alive_interval_secs: default_keep_alive_interval_secs(),
            receive_buffer_size: default_receive_buffer_size(),
            max_message_size: default_max_message_size(),
            receive_timeout_secs: default_receive_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            close_timeout_secs: default_close_timeout_secs(),
            stream_interval_ms: default_stream_interval_ms(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        ShutdownConfig {
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_websocket_config() {
        let ws = WebSocketConfig::default();
        assert_eq!(ws.keep_alive_interval_secs, 30);
        assert_eq!(ws.receive_buffer_size, 16_384);
        assert_eq!(ws.max_message_size, 1_048_576);
        assert_eq!(ws.receive_timeout_secs, 120);
        assert_eq!(ws.idle_timeout_secs, 300);
        assert_eq!(ws.stream_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_default_http_config() {
        let config = Config::default();
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.http.port, 8080);
        assert!(config.http.cors_origins.is_empty());
        assert!(!config.http.cors_allow_all);
    }

    #[test]
    fn test_default_logging_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_zero_timeouts_disable_policies() {
        let ws = WebSocketConfig {
            keep_alive_interval_secs: 0,
            receive_timeout_secs: 0,
            idle_timeout_secs: 0,
            ..WebSocketConfig::default()
        };
        assert!(ws.keep_alive_interval().is_none());
        assert!(ws.receive_timeout().is_none());
        assert!(ws.idle_timeout().is_none());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_message_size() {
        let mut config = Config::default();
        config.websocket.max_message_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_message_size"));
    }

    #[test]
    fn test_validate_rejects_buffer_larger_than_message() {
        let mut config = Config::default();
        config.websocket.receive_buffer_size = 2048;
        config.websocket.max_message_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[websocket]"));
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.websocket, config.websocket);
        assert_eq!(back.http.port, 8080);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[websocket]\nidle_timeout_secs = 10\n").unwrap();
        assert_eq!(config.websocket.idle_timeout_secs, 10);
        assert_eq!(config.websocket.receive_timeout_secs, 120);
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.websocket, WebSocketConfig::default());
        assert_eq!(config.shutdown.drain_timeout_secs, 10);
    }
}
