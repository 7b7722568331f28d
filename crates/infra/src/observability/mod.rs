//! Observability infrastructure: metrics backends and tracing setup
//!
//! Two [`StatsClient`](statskit_common::StatsClient) backends live here:
//! - [`prometheus::PrometheusClient`]: pull model, instruments must be
//!   registered up front and are scraped through a mounted handler
//! - [`exporters::StatsdClient`]: push model, any name is accepted and lines
//!   are batched to a StatsD agent over UDP
//!
//! ## Error Handling
//!
//! Every emission returns `StatsResult<()>`. Decorators never propagate these
//! errors; they log and continue:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use statskit_common::stats::warn_on_failure;
//! use statskit_common::{Labels, NoOpStatsClient, StatsClient};
//!
//! let stats = NoOpStatsClient;
//! warn_on_failure(
//!     "sql_operation",
//!     stats.timing("sql_operation", &Labels::new(), Duration::from_millis(4)),
//! );
//! ```

pub mod exporters;
pub mod logging;
pub mod prometheus;

pub use logging::{init_tracing, LoggingError};
