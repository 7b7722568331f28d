//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events. Binaries and test harnesses call
//! [`init_tracing`] once to decide where those events go.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Tracing initialisation errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    InvalidFilter {
        /// Directive that failed to parse
        directive: String,
        /// Parser message
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to [`DEFAULT_LOG_FILTER`] when `RUST_LOG` is not set. With
/// `json = true` events are written as one JSON object per line.
///
/// # Errors
/// Returns [`LoggingError::AlreadyInstalled`] instead of panicking when a
/// subscriber has already been set for this process.
pub fn init_tracing(json: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .map_err(|e| LoggingError::InvalidFilter {
            directive: DEFAULT_LOG_FILTER.to_string(),
            message: e.to_string(),
        })?;

    let json_layer = json.then(|| fmt::layer().json().with_target(true).with_line_number(true));
    let text_layer = (!json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry().with(filter).with(json_layer).with(text_layer).try_init()?;

    tracing::debug!(json, "tracing subscriber installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let _ = init_tracing(false);

        let second = init_tracing(true);
        assert!(matches!(second, Err(LoggingError::AlreadyInstalled(_))));
    }
}
