//! Broker configuration.
//!
//! Configuration is read from a TOML file and may be overridden by command
//! line flags. Every field has a default, so an empty file (or no file at
//! all) yields a working broker on `0.0.0.0:8765`.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8765
//!
//! [connection]
//! outbound_buffer = 64
//! write_timeout_ms = 5000
//! idle_timeout_secs = 0
//! max_message_size = 1048576
//! decode_errors = "disconnect"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8765;

/// Default maximum inbound frame size (1 MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "BEACON_CONFIG";

/// What to do when a frame fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Close the connection and drop its registrations
    #[default]
    Disconnect,

    /// Log the frame and keep reading
    Skip,
}

impl FromStr for DecodeErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnect" => Ok(Self::Disconnect),
            "skip" => Ok(Self::Skip),
            other => Err(ConfigError::InvalidValue {
                field: "decode_errors",
                reason: format!("expected \"disconnect\" or \"skip\", got \"{other}\""),
            }),
        }
    }
}

impl fmt::Display for DecodeErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnect => f.write_str("disconnect"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Interface to bind
    pub host: String,

    /// TCP port to bind (0 picks a free port)
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Per-connection limits and policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,

    /// How long a relay may wait for room in a peer's queue
    pub write_timeout_ms: u64,

    /// Close connections silent for this long (0 disables)
    pub idle_timeout_secs: u64,

    /// Largest accepted inbound frame, in bytes
    pub max_message_size: usize,

    pub decode_errors: DecodeErrorPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
            write_timeout_ms: 5_000,
            idle_timeout_secs: 0,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            decode_errors: DecodeErrorPolicy::Disconnect,
        }
    }
}

impl ConnectionSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Returns `None` when idle connections are kept open indefinitely.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Top-level broker configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub server: ServerSection,
    pub connection: ConnectionSettings,
}

impl BrokerConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid TOML for this schema
    /// - `ConfigError::InvalidValue` if a value is out of range
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                error,
            },
            other => other,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: None,
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves which config file to use, if any.
    ///
    /// Order: explicit path, then `BEACON_CONFIG`, then
    /// `<config dir>/beacon/config.toml` when that file exists.
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::default_path().filter(|path| path.exists())
    }

    /// Returns `<config dir>/beacon/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("beacon").join("config.toml"))
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "outbound_buffer",
                reason: "must be at least 1".into(),
            });
        }
        if self.connection.max_message_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_message_size",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Returns the `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: None,
            error: e.to_string(),
        })
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("invalid config{}: {error}", location(.path))]
    Parse { path: Option<PathBuf>, error: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}
