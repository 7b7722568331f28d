//! Configuration loader
//!
//! Loads [`StatsConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If none are set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `STATSKIT_PROMETHEUS_ENABLED`: Whether the registry backend is on (true/false)
//! - `STATSKIT_PROMETHEUS_PATH`: Route for the scrape handler
//! - `STATSKIT_STATSD_ENABLED`: Whether the push backend is on (true/false)
//! - `STATSKIT_STATSD_ADDRESS`: Aggregator `host:port`
//! - `STATSKIT_STATSD_INTERVAL`: Flush interval in seconds
//! - `STATSKIT_STATSD_PREFIX`: Key prefix
//! - `STATSKIT_HTTP_ADDRESS`: Listen address
//! - `STATSKIT_HTTP_PORT`: Listen port
//! - `STATSKIT_HTTP_CLIENT_TIMEOUT`: Outbound request timeout in seconds
//!
//! Unset variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./statskit.{json,toml}` or `./config.{json,toml}` (current working directory)
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{ConfigError, ConfigResult, StatsConfig};

const ENV_PREFIX: &str = "STATSKIT_";

const FILE_NAMES: [&str; 8] = [
    "statskit.json",
    "statskit.toml",
    "config.json",
    "config.toml",
    "../config.json",
    "../config.toml",
    "../../config.json",
    "../../config.toml",
];

/// Load configuration with automatic fallback strategy
///
/// Uses the environment when any `STATSKIT_*` variable is set, otherwise
/// the first config file found by [`probe_config_paths`].
///
/// # Errors
/// Returns [`ConfigError`] if neither source yields a valid configuration.
pub fn load() -> ConfigResult<StatsConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::NoEnvironment) => {
            tracing::debug!("No STATSKIT_* variables set, trying file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// [`ConfigError::NoEnvironment`] when no recognised variable is set;
/// [`ConfigError::InvalidValue`] when one does not parse.
pub fn load_from_env() -> ConfigResult<StatsConfig> {
    let any_set = std::env::vars().any(|(key, _)| key.starts_with(ENV_PREFIX));
    if !any_set {
        return Err(ConfigError::NoEnvironment);
    }

    let mut config = StatsConfig::default();

    config.prometheus.enabled = env_bool("STATSKIT_PROMETHEUS_ENABLED", config.prometheus.enabled);
    if let Some(path) = env_opt("STATSKIT_PROMETHEUS_PATH") {
        config.prometheus.path = path;
    }

    config.statsd.enabled = env_bool("STATSKIT_STATSD_ENABLED", config.statsd.enabled);
    if let Some(address) = env_opt("STATSKIT_STATSD_ADDRESS") {
        config.statsd.address = address;
    }
    if let Some(interval) = env_parse("STATSKIT_STATSD_INTERVAL")? {
        config.statsd.interval_seconds = interval;
    }
    if let Some(prefix) = env_opt("STATSKIT_STATSD_PREFIX") {
        config.statsd.prefix = prefix;
    }

    if let Some(address) = env_opt("STATSKIT_HTTP_ADDRESS") {
        config.http.address = address;
    }
    if let Some(port) = env_parse("STATSKIT_HTTP_PORT")? {
        config.http.port = port;
    }
    if let Some(timeout) = env_parse("STATSKIT_HTTP_CLIENT_TIMEOUT")? {
        config.http.client_timeout_seconds = timeout;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension.
///
/// # Errors
/// Returns [`ConfigError`] if the file is missing, unreadable or malformed.
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<StatsConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound { path: p });
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> ConfigResult<StatsConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => Ok(serde_json::from_str(contents)?),
        _ => Err(ConfigError::UnsupportedFormat { extension: extension.to_string() }),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(FILE_NAMES.iter().map(|name| cwd.join(name)));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(FILE_NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Parse an optional numeric variable.
fn env_parse<T>(key: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
                value,
            })
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
