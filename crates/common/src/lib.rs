//! Shared metrics primitives used across statskit crates.
//!
//! This crate holds everything that does not touch a real backend:
//! - [`stats::Labels`]: ordered key/value label encoding
//! - [`stats::StatsClient`]: the backend-agnostic metrics capability
//! - [`stats::NoOpStatsClient`]: discard sink used when metrics are disabled
//! - [`stats::StatsError`]: error taxonomy shared by every backend
//!
//! Concrete backends (Prometheus, StatsD) and the instrumented decorators live
//! in `statskit-infra`.
//!
//! # Feature Flags
//!
//! - `test-utils`: exposes [`testing`] doubles to downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_docs)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod stats;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use stats::{
    LifecycleError, Labels, NoOpStatsClient, StatsClient, StatsError, StatsResult,
};
