//! Inbound request timing for axum routers
//!
//! Two middleware functions for `axum::middleware::from_fn_with_state`:
//! - [`request_stats_middleware`] reports `api_request_duration`
//!   (`path`, `code`, `method`) using the matched route template
//! - [`simple_stats_middleware`] reports `simple_api_request_duration`
//!   (`path`, `method`) using the raw, optionally sanitised, URI path

pub mod middleware;

pub use middleware::{
    normalize_path, request_stats_middleware, simple_stats_middleware, PathSanitizer, Skipper,
    StatsMiddlewareState,
};
