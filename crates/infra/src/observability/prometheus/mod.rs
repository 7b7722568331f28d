//! Prometheus backend
//!
//! Instruments are declared up front as [`Collectors`], registered into a
//! registry owned by the client, and scraped through a [`ScrapeHandler`] that
//! the caller mounts wherever its router lives.
//!
//! ```rust
//! use statskit_infra::observability::prometheus::{
//!     sql_collectors, PrometheusClient, DEFAULT_HANDLER_PATH,
//! };
//!
//! let collectors = sql_collectors("billing", "payments", "dev").unwrap();
//! let client = PrometheusClient::new(DEFAULT_HANDLER_PATH, collectors).unwrap();
//!
//! client.add_handler(|path, handler| {
//!     assert_eq!(path, "/prometheus_metrics");
//!     let _body = handler.render().unwrap();
//! });
//! ```

pub mod client;
pub mod collectors;

pub use client::{PrometheusClient, ScrapeHandler, DEFAULT_HANDLER_PATH};
pub use collectors::{
    api_collectors, http_client_collectors, sql_collectors, Collectors, Instrument,
    API_REQUEST_DURATION, HTTP_CLIENT_REQUEST, SIMPLE_API_REQUEST_DURATION, SQL_OPERATION,
};
