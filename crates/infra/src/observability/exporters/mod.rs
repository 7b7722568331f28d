//! Metrics exporters
//!
//! Exporters push collected metrics to external monitoring systems.

pub mod statsd;

// Re-export exporter types for convenience
pub use statsd::{
    StatsdClient, DEFAULT_FLUSH_INTERVAL, DEFAULT_STATSD_ADDR, MAX_DATAGRAM_SIZE, MIN_FLUSH_INTERVAL,
};
