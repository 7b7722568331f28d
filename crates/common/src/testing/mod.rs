//! Testing utilities and helpers
//!
//! - **[`mocks`]**: recording implementation of [`StatsClient`](crate::StatsClient)
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use statskit_common::testing::RecordingStatsClient;
//! use statskit_common::{labels, StatsClient};
//!
//! let stats = RecordingStatsClient::new();
//! stats.timing("sql_operation", &labels!["operation", "select"], Duration::from_millis(3)).unwrap();
//!
//! let calls = stats.timings("sql_operation");
//! assert_eq!(calls.len(), 1);
//! assert_eq!(calls[0].label("operation"), Some("select"));
//! ```

pub mod mocks;

pub use mocks::{MetricKind, RecordedMetric, RecordingStatsClient};
