//! Backend-agnostic metrics capability
//!
//! Components that want to emit metrics hold an `Arc<dyn StatsClient>` and
//! never branch on which backend is configured. When metrics are disabled the
//! [`NoOpStatsClient`] is injected instead of an `Option`.

pub mod error;
pub mod labels;
pub mod noop;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

pub use error::{BoxError, LifecycleError, StatsError, StatsResult};
pub use labels::Labels;
pub use noop::NoOpStatsClient;

/// Generic stats collecting interface.
///
/// Implementations must be safe to call from many threads at once; any
/// synchronization is internal to the implementation.
///
/// Every method reports failures through [`StatsResult`]; unknown metric
/// names are [`StatsError::UnknownMetric`] and shape mismatches are
/// [`StatsError::TypeMismatch`]. Neither is ever fatal.
pub trait StatsClient: Send + Sync + Debug {
    /// Record how long something took.
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()>;

    /// Add `value` to a counter.
    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()>;

    /// Set a gauge to an absolute value.
    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()>;
}

impl<T: StatsClient + ?Sized> StatsClient for Arc<T> {
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()> {
        (**self).timing(name, labels, duration)
    }

    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()> {
        (**self).incr(name, labels, value)
    }

    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()> {
        (**self).gauge(name, labels, value)
    }
}

impl<T: StatsClient + ?Sized> StatsClient for Box<T> {
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()> {
        (**self).timing(name, labels, duration)
    }

    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()> {
        (**self).incr(name, labels, value)
    }

    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()> {
        (**self).gauge(name, labels, value)
    }
}

/// Log a failed emission and swallow it.
///
/// Used by decorators: a metrics failure must never turn into a failure of
/// the operation being measured.
#[inline]
pub fn warn_on_failure(metric: &str, result: StatsResult<()>) {
    if let Err(error) = result {
        tracing::warn!(metric, error = %error, "failed to record metric");
    }
}
