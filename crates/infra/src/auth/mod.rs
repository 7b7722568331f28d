//! Authentication against an external auth service
//!
//! [`AuthProvider`] logs users in and fetches the key pair used to verify
//! issued tokens. [`HttpAuthProvider`] talks to the service through any
//! [`HttpClient`](crate::http::HttpClient), so its calls are timed when the
//! client is instrumented.

pub mod provider;

pub use provider::{
    AuthError, AuthProvider, AuthResult, HttpAuthProvider, SigningKeys, Token, JSON_CONTENT_TYPE,
};
