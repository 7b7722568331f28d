//! Stats error types
//!
//! One taxonomy for every backend so callers can match on failure kinds
//! without knowing which backend is configured.

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

/// Boxed backend error carried by [`StatsError::Backend`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by [`StatsClient`](super::StatsClient) implementations.
///
/// None of these are fatal: a failed emission is reported to the caller of the
/// metrics API and nothing else.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Label sequence cannot be converted into key/value pairs.
    #[error("labels must have an even number of elements to convert to a map, got {len}")]
    OddLength {
        /// Number of elements in the offending label sequence
        len: usize,
    },

    /// No instrument registered under the requested name.
    #[error("no collector registered for metric '{metric}'")]
    UnknownMetric {
        /// Requested metric name
        metric: String,
    },

    /// Instrument exists but cannot accept this operation or label shape.
    #[error("collector '{metric}' does not accept {operation}: {reason}")]
    TypeMismatch {
        /// Metric name
        metric: String,
        /// Operation attempted (`timing`, `incr`, `gauge`)
        operation: &'static str,
        /// Human readable explanation
        reason: String,
    },

    /// Stateful backend used outside its open/close window.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Failure reported by the backend library itself (registration, encoding).
    #[error("{backend} backend error: {source}")]
    Backend {
        /// Backend name (`prometheus`, `statsd`)
        backend: &'static str,
        /// Underlying error
        #[source]
        source: BoxError,
    },

    /// Network send or socket setup failed.
    #[error("network send failed: {source}")]
    SendFailed {
        /// Underlying IO error
        #[from]
        source: io::Error,
    },
}

impl StatsError {
    /// Build a [`StatsError::TypeMismatch`].
    pub fn type_mismatch(
        metric: impl Into<String>,
        operation: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch { metric: metric.into(), operation, reason: reason.into() }
    }

    /// Build a [`StatsError::UnknownMetric`].
    pub fn unknown_metric(metric: impl Into<String>) -> Self {
        Self::UnknownMetric { metric: metric.into() }
    }

    /// Wrap a backend library error.
    pub fn backend<E>(backend: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Backend { backend, source: source.into() }
    }
}

/// Lifecycle violations for backends with explicit open/close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Operation attempted before `open`.
    #[error("stats backend is not open")]
    NotOpen,

    /// `open` called on a backend that is already open.
    #[error("stats backend is already open")]
    AlreadyOpen,

    /// Operation attempted after `close`.
    #[error("stats backend has been closed")]
    Closed,
}

/// Result type for stats operations
pub type StatsResult<T> = Result<T, StatsError>;
