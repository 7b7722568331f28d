//! Outbound HTTP
//!
//! [`HttpClient`] is the request surface; [`ReqwestHttpClient`] implements it
//! over `reqwest` and [`InstrumentedHttpClient`] times any implementation.

pub mod client;
pub mod error;
pub mod instrumented;

pub use client::{HttpClient, ReqwestHttpClient, ReqwestHttpClientBuilder};
pub use error::{HttpError, HttpResult};
pub use instrumented::InstrumentedHttpClient;
