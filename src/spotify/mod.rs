//! # Spotify Integration Module
//!
//! This module provides the client facade for the Spotify Web API. It wires
//! together credential management, request preparation and authorized
//! dispatch, and exposes a set of thin resource wrappers on top.
//!
//! ## Architecture
//!
//! ```text
//! Resource wrappers (artists, playback, library, browse)
//!          ↓
//! Preparer        builds a RequestDescriptor from a RequestSpec
//!          ↓
//! Dispatcher      attaches the Authorization header, refreshes once on expiry
//!          ↓      ↘
//! Transport        AuthManager  (token endpoint: client credentials,
//!                                authorization code, refresh token)
//!          ↓
//! Spotify Web API
//! ```
//!
//! ## Authentication Strategy
//!
//! Two OAuth 2.0 flows are supported:
//!
//! - **Client credentials**: [`Spotify::authorize_client_creds`] obtains an
//!   app-only token. When it expires the grant is simply repeated.
//! - **Authorization code**: [`Spotify::auth_uri`] produces the URL the user
//!   visits, [`Spotify::build_user_creds`] exchanges the returned code. The
//!   resulting user token is refreshed with its refresh token.
//!
//! Whichever flow last succeeded is the *active caller*; every authorized
//! request carries its token.
//!
//! ## Thread Safety
//!
//! Dispatching methods take `&mut self` because a refresh mutates the stored
//! credentials. Share a client across tasks behind a `tokio::sync::Mutex` so
//! that refreshes are serialized.
//!
//! ## Usage Patterns
//!
//! ```rust,ignore
//! let mut spotify = Spotify::new(ClientConfig::default(), config::client_credentials()?)?;
//! spotify.authorize_client_creds().await?;
//! let results = spotify.search("daft punk", &["artist"], None, Some(5)).await?;
//! ```

pub mod artists;
pub mod auth;
pub mod browse;
pub mod dispatch;
pub mod library;
pub mod playback;
pub mod request;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    config::ClientConfig,
    error::{ApiError, ApiErrorKind, AuthError, Result, SpotifyError},
    spotify::{
        auth::AuthManager,
        dispatch::Dispatcher,
        request::{Preparer, RequestDescriptor, RequestSpec},
        transport::{HttpResponse, ReqwestTransport, Transport, TransportError},
    },
    types::{ActiveCaller, ClientCredentials, PrivateUser, UserCredentials},
};

/// Spotify Web API client.
pub struct Spotify {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

impl Spotify {
    /// Creates a client backed by [`ReqwestTransport`].
    pub fn new(
        config: ClientConfig,
        client_creds: ClientCredentials,
    ) -> std::result::Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_transport(config, client_creds, transport))
    }

    /// Creates a client on top of a caller-supplied transport.
    pub fn with_transport(
        config: ClientConfig,
        client_creds: ClientCredentials,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let auth = AuthManager::new(Arc::clone(&transport), &config, client_creds);
        let dispatcher = Dispatcher::new(transport, config.timeout, auth);
        Self { config, dispatcher }
    }

    /// Installs existing user credentials (e.g. loaded from a store) as the active caller.
    pub fn with_user_creds(mut self, user_creds: UserCredentials) -> Self {
        self.set_user_creds(user_creds);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        self.dispatcher.auth()
    }

    pub fn auth_mut(&mut self) -> &mut AuthManager {
        self.dispatcher.auth_mut()
    }

    pub fn client_creds(&self) -> &ClientCredentials {
        self.auth().client_creds()
    }

    pub fn user_creds(&self) -> Option<&UserCredentials> {
        self.auth().user_creds()
    }

    pub fn set_user_creds(&mut self, user_creds: UserCredentials) {
        self.auth_mut().set_user_creds(user_creds);
    }

    /// Client-credentials flow, followed by an authorization probe.
    pub async fn authorize_client_creds(&mut self) -> Result<()> {
        self.auth_mut().exchange_client_credentials().await?;
        self.check_authorization().await
    }

    /// URL for the first half of the authorization-code flow.
    pub fn auth_uri(&mut self, state: Option<String>) -> std::result::Result<String, AuthError> {
        self.auth_mut().authorization_url(state, false)
    }

    /// Like [`Spotify::auth_uri`], with a PKCE code challenge attached.
    pub fn auth_uri_pkce(&mut self, state: Option<String>) -> std::result::Result<String, AuthError> {
        self.auth_mut().authorization_url(state, true)
    }

    /// Second half of the authorization-code flow.
    ///
    /// * `grant` - the `code` the provider redirected back with
    /// * `state` - the `state` the provider redirected back with
    /// * `set_user_creds` - install the result as the active caller
    ///
    /// When the credentials are installed and `populate_user_creds` is on, the
    /// user's profile is loaded next. A failed profile lookup is logged and the
    /// installed, unpopulated credentials are returned.
    pub async fn build_user_creds(
        &mut self,
        grant: &str,
        state: Option<&str>,
        set_user_creds: bool,
    ) -> Result<UserCredentials> {
        let user_creds = self
            .auth_mut()
            .exchange_authorization_code(grant, state)
            .await?;

        if !set_user_creds {
            return Ok(user_creds);
        }

        self.set_user_creds(user_creds.clone());
        if self.config.populate_user_creds {
            if let Err(e) = self.populate_user_creds().await {
                warn!("Authorized, but could not load the user profile: {}", e);
            }
        }
        Ok(self.user_creds().cloned().unwrap_or(user_creds))
    }

    /// Copies `id` and `country` from the current user's profile into the user credentials.
    pub async fn populate_user_creds(&mut self) -> Result<()> {
        let me = self.me().await?;
        match self.auth_mut().user_creds_mut() {
            Some(creds) => {
                creds.user_id = Some(me.id);
                creds.country = me.country;
                Ok(())
            }
            None => Err(AuthError::new("No user credentials to populate").into()),
        }
    }

    pub async fn me(&mut self) -> Result<PrivateUser> {
        let request = self.preparer().me();
        self.send_json(&request).await
    }

    pub async fn is_premium(&mut self) -> Result<bool> {
        let request = self.preparer().is_premium();
        let me: PrivateUser = self.send_json(&request).await?;
        Ok(me.is_premium())
    }

    /// Fails with [`AuthError`] if the active caller cannot currently authorize requests.
    pub async fn check_authorization(&mut self) -> Result<()> {
        let probe = self.preparer().check_authorization();
        self.dispatcher.check_authorization(&probe).await
    }

    /// Whether the active caller is usable right now, refreshing if needed.
    pub async fn is_active(&mut self) -> Result<bool> {
        if self.auth().caller().is_none() {
            return Ok(false);
        }
        match self.check_authorization().await {
            Ok(()) => Ok(true),
            Err(SpotifyError::Auth(e)) => {
                warn!("Credentials are not active: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn preparer(&self) -> Preparer {
        let locale = match self.auth().caller() {
            Some(ActiveCaller::User) if self.config.default_to_locale => {
                self.user_creds().and_then(|c| c.country.clone())
            }
            _ => None,
        };
        Preparer::new(&self.config.api_url).with_locale(locale)
    }

    pub fn prepare(&self, spec: RequestSpec) -> RequestDescriptor {
        self.preparer().prepare(spec)
    }

    /// Prepares and dispatches `spec`, returning the raw response.
    pub async fn send(&mut self, spec: RequestSpec) -> Result<HttpResponse> {
        let request = self.prepare(spec);
        self.dispatcher.send_authorized(&request).await
    }

    /// Prepares and dispatches `spec`, decoding the body into `T`.
    pub async fn request<T: DeserializeOwned>(&mut self, spec: RequestSpec) -> Result<T> {
        let request = self.prepare(spec);
        self.send_json(&request).await
    }

    /// For endpoints that may succeed without a body: an empty body becomes `{}`.
    pub async fn request_nullable(&mut self, spec: RequestSpec) -> Result<Value> {
        let request = self.prepare(spec);
        let response = self.dispatcher.send_authorized(&request).await?;
        if response.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        decode(&request, &response)
    }

    async fn send_json<T: DeserializeOwned>(&mut self, request: &RequestDescriptor) -> Result<T> {
        let response = self.dispatcher.send_authorized(request).await?;
        decode(request, &response)
    }
}

fn decode<T: DeserializeOwned>(request: &RequestDescriptor, response: &HttpResponse) -> Result<T> {
    response.json::<T>().map_err(|e| {
        ApiError::new(ApiErrorKind::Decode, format!("Failed to decode response: {e}"))
            .with_request(request)
            .with_response(response)
            .with_source(e)
            .into()
    })
}
