//! HTTP client errors

/// Errors returned by [`HttpClient`](super::HttpClient) implementations.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The target URL could not be parsed; no request was sent.
    #[error("invalid url '{url}': {source}")]
    InvalidUrl {
        /// URL as given by the caller
        url: String,
        /// Parser error
        source: url::ParseError,
    },

    /// A header value supplied by the caller is not valid.
    #[error("invalid value for header {name}: {value:?}")]
    InvalidHeader {
        /// Header name
        name: &'static str,
        /// Rejected value
        value: String,
    },

    /// Building, sending or reading the request failed.
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Result type for HTTP client operations
pub type HttpResult<T> = Result<T, HttpError>;
