//! Configuration loading and management
//!
//! [`StatsConfig`] selects and parameterises the metrics backends and the HTTP
//! surfaces. Every field has a default, so partial files and partial
//! environments are accepted.

pub mod loader;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use statskit_common::StatsResult;

use crate::observability::exporters::{StatsdClient, DEFAULT_STATSD_ADDR};
use crate::observability::prometheus::{Collectors, PrometheusClient, DEFAULT_HANDLER_PATH};

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly given path does not exist.
    #[error("config file not found: {}", path.display())]
    NotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// Probing found no config file.
    #[error("no config file found in any of the standard locations")]
    NoConfigFile,

    /// No `STATSKIT_*` variable is set.
    #[error("no STATSKIT_* environment variables are set")]
    NoEnvironment,

    /// The file exists but could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// File being read
        path: PathBuf,
        /// IO failure
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error.
    #[error("invalid TOML format: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error.
    #[error("invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension is neither `toml` nor `json`.
    #[error("unsupported config format: {extension}")]
    UnsupportedFormat {
        /// Extension found on the path
        extension: String,
    },

    /// An environment variable did not parse.
    #[error("invalid value for {key}: {value:?} ({message})")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        message: String,
    },
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Pull-registry backend
    pub prometheus: PrometheusConfig,
    /// Push-aggregator backend
    pub statsd: StatsdConfig,
    /// HTTP listener and client
    pub http: HttpConfig,
}

/// Pull-registry backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Whether the registry backend is used
    pub enabled: bool,
    /// Route the scrape handler should be mounted on
    pub path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true, path: DEFAULT_HANDLER_PATH.to_string() }
    }
}

impl PrometheusConfig {
    /// Build a registry-backed client with `collectors` pre-registered.
    ///
    /// # Errors
    /// See [`PrometheusClient::new`].
    pub fn client(&self, collectors: Collectors) -> StatsResult<PrometheusClient> {
        PrometheusClient::new(self.path.clone(), collectors)
    }
}

/// Push-aggregator backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsdConfig {
    /// Whether the StatsD backend is used
    pub enabled: bool,
    /// `host:port` of the aggregator
    pub address: String,
    /// Seconds between buffer flushes
    pub interval_seconds: u64,
    /// Prefix prepended to every key
    pub prefix: String,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: DEFAULT_STATSD_ADDR.to_string(),
            interval_seconds: 2,
            prefix: String::new(),
        }
    }
}

impl StatsdConfig {
    /// Flush interval; zero is raised to one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    /// Build an unopened client; call [`StatsdClient::open`] before use.
    pub fn client(&self) -> StatsdClient {
        StatsdClient::new(self.address.clone(), &self.prefix, self.interval())
    }
}

/// Inbound listener and outbound client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address
    pub address: String,
    /// Listen port
    pub port: u16,
    /// Outbound request timeout in seconds
    pub client_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { address: "0.0.0.0".to_string(), port: 8080, client_timeout_seconds: 30 }
    }
}

impl HttpConfig {
    /// `address:port`, bracketing IPv6 literals.
    pub fn listen_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// Outbound request timeout.
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_seconds)
    }
}
