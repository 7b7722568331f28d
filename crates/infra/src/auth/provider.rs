use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Body, StatusCode};
use serde::{Deserialize, Serialize};
use statskit_common::StatsClient;
use tracing::{debug, warn};

use crate::http::{HttpClient, HttpError, InstrumentedHttpClient, ReqwestHttpClient};

/// Content type of login and signing-key requests.
pub const JSON_CONTENT_TYPE: &str = "application/json";

const LOGIN_PATH: &str = "v1/login";
const SIGNING_KEYS_PATH: &str = "v1/auth";

/// Errors returned by [`AuthProvider`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The service rejected the credentials.
    #[error("invalid login")]
    InvalidLogin,

    /// The service did not hand out signing keys.
    #[error("could not get signing keys (status {status})")]
    NoSigningKeys {
        /// HTTP status the service answered with
        status: u16,
    },

    /// The request could not be sent or its body not read.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The service answered with a body that is not the expected JSON.
    #[error("malformed auth response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Raw token issued by the auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Token as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap the raw token.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Tokens are credentials; keep them out of debug logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Key pair the auth service signs tokens with.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SigningKeys {
    /// Key used to verify tokens
    pub public_key: String,
    /// Key used to sign tokens
    pub private_key: String,
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .finish()
    }
}

/// Authenticates users and services with an external source.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange a username and password for a token.
    ///
    /// # Errors
    /// [`AuthError::InvalidLogin`] for any non-200 answer.
    async fn login(&self, username: &str, password: &str) -> AuthResult<Token>;

    /// Fetch the signing keys for service `name`, authenticated by `token`.
    ///
    /// # Errors
    /// [`AuthError::NoSigningKeys`] for any non-200 answer.
    async fn request_signing_keys(&self, name: &str, token: &str) -> AuthResult<SigningKeys>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
struct SigningKeysRequest<'a> {
    service_name: &'a str,
    service_token: &'a str,
}

/// [`AuthProvider`] speaking JSON over HTTP.
#[derive(Debug)]
pub struct HttpAuthProvider<C> {
    host: String,
    client: C,
}

impl<C: HttpClient> HttpAuthProvider<C> {
    /// Use `client` to reach the service at `host` (scheme included).
    pub fn new(host: impl Into<String>, client: C) -> Self {
        let host: String = host.into();
        Self { host: host.trim_end_matches('/').to_string(), client }
    }

    /// Service base URL without a trailing `/`.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.host)
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> AuthResult<reqwest::Response> {
        let payload = serde_json::to_vec(body)?;
        let url = self.url(path);
        debug!(%url, "calling auth service");
        Ok(self.client.post(&url, JSON_CONTENT_TYPE, Body::from(payload)).await?)
    }
}

impl HttpAuthProvider<ReqwestHttpClient> {
    /// Provider over a default [`ReqwestHttpClient`].
    ///
    /// # Errors
    /// [`AuthError::Http`] if the client cannot be built.
    pub fn with_default_client(host: impl Into<String>) -> AuthResult<Self> {
        Ok(Self::new(host, ReqwestHttpClient::new()?))
    }
}

impl HttpAuthProvider<InstrumentedHttpClient<ReqwestHttpClient>> {
    /// Provider whose calls are reported as `http_client_request` timings.
    ///
    /// # Errors
    /// [`AuthError::Http`] if the client cannot be built.
    pub fn with_stats(host: impl Into<String>, stats: Arc<dyn StatsClient>) -> AuthResult<Self> {
        let client = InstrumentedHttpClient::new(ReqwestHttpClient::new()?, stats);
        Ok(Self::new(host, client))
    }
}

#[async_trait]
impl<C: HttpClient> AuthProvider for HttpAuthProvider<C> {
    async fn login(&self, username: &str, password: &str) -> AuthResult<Token> {
        let response = self.post_json(LOGIN_PATH, &LoginRequest { email: username, password }).await?;

        if response.status() != StatusCode::OK {
            warn!(status = response.status().as_u16(), "login rejected");
            return Err(AuthError::InvalidLogin);
        }

        let body = response.bytes().await.map_err(HttpError::from)?;
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(Token(parsed.token))
    }

    async fn request_signing_keys(&self, name: &str, token: &str) -> AuthResult<SigningKeys> {
        let request = SigningKeysRequest { service_name: name, service_token: token };
        let response = self.post_json(SIGNING_KEYS_PATH, &request).await?;

        let status = response.status();
        let body = response.bytes().await.map_err(HttpError::from)?;
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), service = name, "signing keys refused");
            return Err(AuthError::NoSigningKeys { status: status.as_u16() });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
