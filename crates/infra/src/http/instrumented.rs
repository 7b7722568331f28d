//! Timing decorator for [`HttpClient`]
//!
//! Emits `http_client_request` with the labels `hostname`, `path` and `method`
//! for every request that reaches the wrapped client.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Body, Request, Response};
use statskit_common::stats::warn_on_failure;
use statskit_common::{labels, Labels, StatsClient};
use tracing::debug;
use url::Url;

use super::client::HttpClient;
use super::error::{HttpError, HttpResult};
use crate::observability::prometheus::HTTP_CLIENT_REQUEST;

const UNKNOWN_HOST: &str = "unknown-host";

/// [`HttpClient`] decorator that times every request.
///
/// URLs are parsed before delegating; one that does not parse fails with
/// [`HttpError::InvalidUrl`] without touching the network or emitting a sample.
pub struct InstrumentedHttpClient<C> {
    inner: C,
    stats: Arc<dyn StatsClient>,
}

impl<C: HttpClient> InstrumentedHttpClient<C> {
    /// Wrap `inner`, reporting request durations to `stats`.
    pub fn new(inner: C, stats: Arc<dyn StatsClient>) -> Self {
        Self { inner, stats }
    }

    /// Wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn timed<F>(&self, method: &str, url: &Url, request: F) -> HttpResult<Response>
    where
        F: Future<Output = HttpResult<Response>> + Send,
    {
        let start = Instant::now();
        let result = request.await;
        let elapsed = start.elapsed();

        let labels = request_labels(url, method);
        debug!(%url, method, elapsed_ms = elapsed.as_millis() as u64, "http request timed");
        warn_on_failure(HTTP_CLIENT_REQUEST, self.stats.timing(HTTP_CLIENT_REQUEST, &labels, elapsed));

        result
    }
}

impl<C: fmt::Debug> fmt::Debug for InstrumentedHttpClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentedHttpClient")
            .field("inner", &self.inner)
            .field("stats", &self.stats)
            .finish()
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for InstrumentedHttpClient<C> {
    async fn execute(&self, request: Request) -> HttpResult<Response> {
        let method = request.method().as_str().to_string();
        let url = request.url().clone();
        self.timed(&method, &url, self.inner.execute(request)).await
    }

    async fn get(&self, url: &str) -> HttpResult<Response> {
        let parsed = parse_url(url)?;
        self.timed("GET", &parsed, self.inner.get(url)).await
    }

    async fn head(&self, url: &str) -> HttpResult<Response> {
        let parsed = parse_url(url)?;
        self.timed("HEAD", &parsed, self.inner.head(url)).await
    }

    async fn post(&self, url: &str, content_type: &str, body: Body) -> HttpResult<Response> {
        let parsed = parse_url(url)?;
        self.timed("POST", &parsed, self.inner.post(url, content_type, body)).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> HttpResult<Response> {
        let parsed = parse_url(url)?;
        self.timed("POST", &parsed, self.inner.post_form(url, form)).await
    }
}

fn parse_url(url: &str) -> HttpResult<Url> {
    Url::parse(url).map_err(|source| HttpError::InvalidUrl { url: url.to_string(), source })
}

fn request_labels(url: &Url, method: &str) -> Labels {
    let hostname = url.host_str().filter(|h| !h.is_empty()).unwrap_or(UNKNOWN_HOST);
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    labels!["hostname", hostname, "path", path, "method", method]
}
