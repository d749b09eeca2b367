//! Authorized request dispatch.
//!
//! A single logical call moves through these states:
//!
//! ```text
//! BUILT -> SENT -> SUCCESS
//!               -> REFRESH_RETRY -> SENT -> SUCCESS | FAILED
//!               -> FAILED
//! ```
//!
//! `REFRESH_RETRY` is entered only when the provider answers `401` with the
//! token-expired sentinel, and at most once per call. A second `401` after the
//! retry is terminal.

use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    config::TOKEN_EXPIRED_MSG,
    error::{ApiError, ApiErrorKind, AuthError, Result, SpotifyError, envelope_message},
    spotify::{
        auth::AuthManager,
        request::RequestDescriptor,
        transport::{HttpResponse, Transport, TransportError},
    },
};

/// Result of inspecting one response.
#[derive(Debug)]
pub enum Outcome {
    Success(HttpResponse),
    /// `401` carrying the provider's token-expired sentinel.
    TokenExpired(HttpResponse),
    Failed(SpotifyError),
}

/// Sorts a response into success, expired-token, or a classified failure.
pub fn classify(request: &RequestDescriptor, response: HttpResponse) -> Outcome {
    if response.is_success() {
        return Outcome::Success(response);
    }

    if response.status == 401 {
        if envelope_message(&response).as_deref() == Some(TOKEN_EXPIRED_MSG) {
            return Outcome::TokenExpired(response);
        }
        let msg = crate::error::error_message(&response);
        return Outcome::Failed(
            AuthError::new(msg)
                .with_request(request)
                .with_response(&response)
                .into(),
        );
    }

    Outcome::Failed(ApiError::from_response(request, &response).into())
}

/// Sends without authorization handling, mapping transport failures to [`ApiError`].
pub async fn send_raw(
    transport: &dyn Transport,
    request: &RequestDescriptor,
    timeout: Duration,
) -> Result<HttpResponse> {
    debug!("{} {}", request.method, request.url);
    match transport.send(request, timeout).await {
        Ok(response) => Ok(response),
        Err(TransportError::Timeout) => {
            warn!("{} {} timed out after {:?}", request.method, request.url, timeout);
            Err(ApiError::timeout(request).into())
        }
        Err(err) => Err(ApiError::new(ApiErrorKind::Transport, err.to_string())
            .with_request(request)
            .with_source(err)
            .into()),
    }
}

/// Attaches credentials to requests and drives the refresh-and-retry cycle.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    auth: AuthManager,
}

impl Dispatcher {
    /// Creates a dispatcher that sends through `transport` with a per-call `timeout`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport shared with `auth` for token-endpoint calls
    /// * `timeout` - Deadline handed to the transport for every send
    /// * `auth` - Owner of the credentials, moved into the dispatcher
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration, auth: AuthManager) -> Self {
        Self {
            transport,
            timeout,
            auth,
        }
    }

    /// Credential state, read-only.
    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Credential state, e.g. to install user credentials or force a refresh.
    pub fn auth_mut(&mut self) -> &mut AuthManager {
        &mut self.auth
    }

    /// Sends `request` on behalf of the active caller.
    ///
    /// A user token known to be expired is refreshed before sending. Every
    /// refresh must produce a different access token, see [`AuthManager::refresh`]. If the
    /// provider reports the token as expired, the caller is refreshed once and
    /// a fresh copy of `request` is sent with the new header. A retried call
    /// that still gets `401` fails with [`AuthError`].
    pub async fn send_authorized(&mut self, request: &RequestDescriptor) -> Result<HttpResponse> {
        if self.auth.active_is_expired() {
            debug!("Access token expired, refreshing before sending");
            self.auth.refresh().await?;
        }

        let header = self.auth.active_authorization_header()?;
        let attempt = request.authorized(&header);
        let response = send_raw(self.transport.as_ref(), &attempt, self.timeout).await?;

        let expired = match classify(&attempt, response) {
            Outcome::Success(response) => return Ok(response),
            Outcome::Failed(err) => return Err(err),
            Outcome::TokenExpired(response) => response,
        };

        debug!("Provider reported an expired token, refreshing once");
        self.auth.refresh().await.map_err(|e| {
            let err = e.into_auth("Failed to refresh expired access token");
            let err = if err.http_response.is_none() {
                err.with_request(&attempt).with_response(&expired)
            } else {
                err
            };
            SpotifyError::from(err)
        })?;

        let new_header = self.auth.active_authorization_header()?;

        let retry = request.authorized(&new_header);
        let response = send_raw(self.transport.as_ref(), &retry, self.timeout).await?;
        match classify(&retry, response) {
            Outcome::Success(response) => Ok(response),
            Outcome::TokenExpired(response) => {
                Err(AuthError::new("Access token still rejected after refresh")
                    .with_request(&retry)
                    .with_response(&response)
                    .into())
            }
            Outcome::Failed(err) => Err(err),
        }
    }

    /// Validates the active caller's credentials with a cheap authorized call.
    pub async fn check_authorization(&mut self, probe: &RequestDescriptor) -> Result<()> {
        self.send_authorized(probe).await.map(|_| ())
    }
}
