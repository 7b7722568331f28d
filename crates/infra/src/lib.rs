//! # Statskit Infrastructure
//!
//! Concrete metrics backends and the instrumented decorators built on top of
//! the [`StatsClient`](statskit_common::StatsClient) capability.
//!
//! This crate contains:
//! - Metrics backends: Prometheus registry ([`observability::prometheus`]) and
//!   StatsD push aggregator ([`observability::exporters::statsd`])
//! - Data access: SQLite data source, instrumented decorator and the
//!   transaction helper ([`database`])
//! - Outbound HTTP: reqwest client and its instrumented decorator ([`http`])
//! - Auth provider built on the HTTP client ([`auth`])
//! - Inbound request timing middleware for axum ([`api`])
//! - Configuration loading ([`config`]) and tracing setup
//!
//! ## Architecture
//! - Depends on `statskit-common` for labels, the client trait and errors
//! - Contains all "impure" code (sockets, database files, HTTP)

#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use config::StatsConfig;
pub use database::{
    with_transaction, DataContext, DataContextExt, DataError, DataResult, DataSource,
    InstrumentedDataSource, SqliteDataSource, Transaction,
};
pub use http::{HttpClient, HttpError, InstrumentedHttpClient, ReqwestHttpClient};
pub use observability::exporters::StatsdClient;
pub use observability::prometheus::{Collectors, PrometheusClient};
