//! Error types surfaced by the client.
//!
//! Every failure of an authorized call ends up as one of two kinds:
//!
//! - [`AuthError`] - credentials are missing or unusable, a refresh was
//!   impossible, the OAuth `state` did not round-trip, or the provider
//!   answered `401` with anything other than the token-expired sentinel.
//! - [`ApiError`] - any other non-success status, a transport timeout, a
//!   transport failure, or an undecodable success body.
//!
//! Both carry the request that was sent and the response that came back
//! (when there was one) plus an optional lower-level cause.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::spotify::{request::RequestDescriptor, transport::HttpResponse};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result type alias for client operations.
pub type Result<T> = std::result::Result<T, SpotifyError>;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SpotifyError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SpotifyError::Auth(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SpotifyError::Api(e) if e.kind == ApiErrorKind::Timeout)
    }

    pub fn http_response(&self) -> Option<&HttpResponse> {
        match self {
            SpotifyError::Auth(e) => e.http_response.as_ref(),
            SpotifyError::Api(e) => e.http_response.as_ref(),
        }
    }

    pub fn http_request(&self) -> Option<&RequestDescriptor> {
        match self {
            SpotifyError::Auth(e) => e.http_request.as_ref(),
            SpotifyError::Api(e) => e.http_request.as_ref(),
        }
    }

    /// Re-labels any failure as an [`AuthError`], keeping the original as the cause.
    ///
    /// Used when a token-endpoint call fails: whatever the provider said, the
    /// caller's credentials are what could not be obtained.
    pub(crate) fn into_auth(self, msg: impl Into<String>) -> AuthError {
        match self {
            SpotifyError::Auth(e) => e,
            SpotifyError::Api(e) => AuthError {
                msg: msg.into(),
                http_request: e.http_request.clone(),
                http_response: e.http_response.clone(),
                source: Some(Box::new(e)),
            },
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct AuthError {
    pub msg: String,
    pub http_request: Option<RequestDescriptor>,
    pub http_response: Option<HttpResponse>,
    #[source]
    pub source: Option<BoxError>,
}

impl AuthError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            http_request: None,
            http_response: None,
            source: None,
        }
    }

    pub fn with_request(mut self, request: &RequestDescriptor) -> Self {
        self.http_request = Some(request.clone());
        self
    }

    pub fn with_response(mut self, response: &HttpResponse) -> Self {
        self.http_response = Some(response.clone());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    Timeout,
    Status(u16),
    Transport,
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Status(code) => write!(f, "status {code}"),
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Decode => write!(f, "decode"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Spotify API error ({kind}): {msg}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub msg: String,
    pub http_request: Option<RequestDescriptor>,
    pub http_response: Option<HttpResponse>,
    #[source]
    pub source: Option<BoxError>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            http_request: None,
            http_response: None,
            source: None,
        }
    }

    pub fn timeout(request: &RequestDescriptor) -> Self {
        Self::new(
            ApiErrorKind::Timeout,
            "Request timed out. Try increasing the client's timeout period",
        )
        .with_request(request)
    }

    /// Builds a status error from a failed response, extracting the provider's message.
    pub fn from_response(request: &RequestDescriptor, response: &HttpResponse) -> Self {
        Self::new(
            ApiErrorKind::Status(response.status),
            error_message(response),
        )
        .with_request(request)
        .with_response(response)
    }

    pub fn with_request(mut self, request: &RequestDescriptor) -> Self {
        self.http_request = Some(request.clone());
        self
    }

    pub fn with_response(mut self, response: &HttpResponse) -> Self {
        self.http_response = Some(response.clone());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Best-effort message extraction from an error body.
///
/// Tries `error.message`, then `error_description`, then a bare string
/// `error`, and finally falls back to the raw body text.
pub fn error_message(response: &HttpResponse) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(&response.body) {
        if let Some(msg) = json.pointer("/error/message").and_then(Value::as_str) {
            return msg.to_string();
        }
        if let Some(msg) = json.get("error_description").and_then(Value::as_str) {
            return msg.to_string();
        }
        if let Some(msg) = json.get("error").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    response.text()
}

/// Returns the `error.message` field of a `{"error": {...}}` envelope, if any.
pub fn envelope_message(response: &HttpResponse) -> Option<String> {
    serde_json::from_slice::<Value>(&response.body)
        .ok()?
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Failures while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to prepare config directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenv::Error),
    #[error("{0} must be set")]
    MissingVar(&'static str),
}

/// Failures while reading or writing persisted credentials.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store contents are invalid: {0}")]
    Serde(#[from] serde_json::Error),
}
