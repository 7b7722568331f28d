use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Body, Client as ReqwestClient, Request, RequestBuilder, Response};
use tracing::debug;

use super::error::{HttpError, HttpResult};
use crate::config::HttpConfig;

/// Outbound HTTP request surface.
///
/// Convenience methods take the URL as a string so decorators can inspect it
/// before anything goes on the wire.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a fully built request.
    async fn execute(&self, request: Request) -> HttpResult<Response>;

    /// `GET url`
    async fn get(&self, url: &str) -> HttpResult<Response>;

    /// `HEAD url`
    async fn head(&self, url: &str) -> HttpResult<Response>;

    /// `POST url` with a body of the given content type.
    async fn post(&self, url: &str, content_type: &str, body: Body) -> HttpResult<Response>;

    /// `POST url` with an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> HttpResult<Response>;
}

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: ReqwestClient,
}

impl ReqwestHttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> ReqwestHttpClientBuilder {
        ReqwestHttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    ///
    /// # Errors
    /// Returns [`HttpError::Request`] if the TLS backend cannot be initialised.
    pub fn new() -> HttpResult<Self> {
        Self::builder().build()
    }

    /// Build a client using the timeout from [`HttpConfig`].
    ///
    /// # Errors
    /// Returns [`HttpError::Request`] if the TLS backend cannot be initialised.
    pub fn from_config(config: &HttpConfig) -> HttpResult<Self> {
        Self::builder().timeout(config.client_timeout()).build()
    }

    /// Underlying reqwest client, for building requests passed to
    /// [`HttpClient::execute`].
    pub fn inner(&self) -> &ReqwestClient {
        &self.client
    }

    async fn send(&self, builder: RequestBuilder) -> HttpResult<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: Request) -> HttpResult<Response> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(err.into())
            }
        }
    }

    async fn get(&self, url: &str) -> HttpResult<Response> {
        self.send(self.client.get(url)).await
    }

    async fn head(&self, url: &str) -> HttpResult<Response> {
        self.send(self.client.head(url)).await
    }

    async fn post(&self, url: &str, content_type: &str, body: Body) -> HttpResult<Response> {
        let value = HeaderValue::from_str(content_type).map_err(|_| HttpError::InvalidHeader {
            name: "content-type",
            value: content_type.to_string(),
        })?;
        self.send(self.client.post(url).header(CONTENT_TYPE, value).body(body)).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> HttpResult<Response> {
        self.send(self.client.post(url).form(form)).await
    }
}

/// Builder for [`ReqwestHttpClient`].
#[derive(Debug)]
pub struct ReqwestHttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for ReqwestHttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None }
    }
}

impl ReqwestHttpClientBuilder {
    /// Total timeout per request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `User-Agent` sent with every request.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Headers added to every request.
    #[must_use]
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    /// Returns [`HttpError::Request`] if reqwest rejects the configuration.
    pub fn build(self) -> HttpResult<ReqwestHttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        Ok(ReqwestHttpClient { client: builder.build()? })
    }
}
