//! Mock implementations of the stats traits
//!
//! Provides a recording client for asserting on what decorators emit.

// Test doubles are kept simple; failure modes are explicit in the API
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::stats::{Labels, StatsClient, StatsError, StatsResult};

/// Which [`StatsClient`] method produced a recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// `timing`
    Timing,
    /// `incr`
    Incr,
    /// `gauge`
    Gauge,
}

/// One call captured by [`RecordingStatsClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMetric {
    /// Method that was called
    pub kind: MetricKind,
    /// Metric name as passed by the caller
    pub name: String,
    /// Labels as passed by the caller
    pub labels: Labels,
    /// Duration for timings
    pub duration: Option<Duration>,
    /// Numeric value for counters and gauges
    pub value: Option<f64>,
}

impl RecordedMetric {
    /// Look up a label value by key.
    ///
    /// Returns `None` when the key is absent or the labels have an odd length.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_map().ok().and_then(|map| map.get(key).copied())
    }
}

/// Stats client that records every call in memory
///
/// Clones share the same log, so a clone can be handed to the code under test
/// while the original is kept for assertions.
///
/// # Examples
///
/// ```
/// use statskit_common::testing::RecordingStatsClient;
/// use statskit_common::{Labels, StatsClient};
///
/// let stats = RecordingStatsClient::failing();
/// assert!(stats.incr("requests", &Labels::new(), 1).is_err());
/// assert_eq!(stats.calls().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingStatsClient {
    calls: Arc<Mutex<Vec<RecordedMetric>>>,
    fail: bool,
}

impl RecordingStatsClient {
    /// Create a client that records and succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that records and then reports every call as an unknown metric
    pub fn failing() -> Self {
        Self { calls: Arc::default(), fail: true }
    }

    /// Snapshot of every recorded call, oldest first
    pub fn calls(&self) -> Vec<RecordedMetric> {
        self.calls.lock().clone()
    }

    /// Recorded timings for `name`
    pub fn timings(&self, name: &str) -> Vec<RecordedMetric> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.kind == MetricKind::Timing && call.name == name)
            .cloned()
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, metric: RecordedMetric) -> StatsResult<()> {
        let name = metric.name.clone();
        self.calls.lock().push(metric);

        if self.fail {
            return Err(StatsError::unknown_metric(name));
        }
        Ok(())
    }
}

impl StatsClient for RecordingStatsClient {
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()> {
        self.record(RecordedMetric {
            kind: MetricKind::Timing,
            name: name.to_string(),
            labels: labels.clone(),
            duration: Some(duration),
            value: None,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()> {
        self.record(RecordedMetric {
            kind: MetricKind::Incr,
            name: name.to_string(),
            labels: labels.clone(),
            duration: None,
            value: Some(value as f64),
        })
    }

    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()> {
        self.record(RecordedMetric {
            kind: MetricKind::Gauge,
            name: name.to_string(),
            labels: labels.clone(),
            duration: None,
            value: Some(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;

    #[test]
    fn test_recording_client_shares_log_between_clones() {
        let stats = RecordingStatsClient::new();
        let handle = stats.clone();

        handle.timing("sql_operation", &labels!["operation", "exec"], Duration::from_millis(2))
            .unwrap();
        handle.gauge("queue_depth", &Labels::new(), 4.0).unwrap();

        let calls = stats.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].kind, MetricKind::Timing);
        assert_eq!(calls[0].label("operation"), Some("exec"));
        assert_eq!(calls[1].value, Some(4.0));

        assert_eq!(stats.timings("sql_operation").len(), 1);
        stats.clear();
        assert!(handle.calls().is_empty());
    }

    #[test]
    fn test_failing_client_still_records() {
        let stats = RecordingStatsClient::failing();
        let err = stats.incr("requests", &Labels::new(), 1).unwrap_err();

        assert!(matches!(err, StatsError::UnknownMetric { .. }));
        assert_eq!(stats.calls().len(), 1);
    }
}
