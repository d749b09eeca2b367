use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Application identity registered with the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub show_dialog: bool,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Default::default()
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_show_dialog(mut self, show_dialog: bool) -> Self {
        self.show_dialog = show_dialog;
        self
    }

    /// Replaces the client secret, e.g. after rotating it in the developer dashboard.
    pub fn rotate_secret(&mut self, client_secret: impl Into<String>) {
        self.client_secret = client_secret.into();
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Access token obtained through the client-credentials flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserlessToken {
    pub access_token: String,
    pub expiry: Option<DateTime<Utc>>,
}

/// Tokens and profile facts for an authenticated user.
///
/// When `expiry` is `None` the token is treated as valid until the provider
/// rejects it with a `401`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub scopes: BTreeSet<String>,
    pub state: Option<String>,
    pub user_id: Option<String>,
    pub country: Option<String>,
}

impl UserCredentials {
    /// Wraps a bare access token, e.g. one copied from the provider's web console.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Builds credentials from a token-endpoint response received at `now`.
    pub fn from_token_response(
        response: &TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        response.validate()?;
        Ok(Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expiry: response.expiry_from(now)?,
            scopes: response.scope_set(),
            ..Default::default()
        })
    }

    /// Overwrites token fields from a refresh response; other fields are kept.
    ///
    /// The refresh token and scopes are replaced only when the response carries them.
    pub fn apply_refresh(
        &mut self,
        response: &TokenResponse,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        response.validate()?;
        let expiry = response.expiry_from(now)?;
        self.access_token = response.access_token.clone();
        self.expiry = expiry;
        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
        if response.scope.is_some() {
            self.scopes = response.scope_set();
        }
        Ok(())
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// True once `now` reaches the stored expiry; false when no expiry is known.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| now >= expiry)
    }
}

/// Which credential set currently authorizes outbound requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveCaller {
    Client,
    User,
}

/// JSON payload returned by the OAuth token endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.is_empty() {
            return Err(AuthError::new("Token response did not contain an access token"));
        }
        if let Some(token_type) = &self.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(AuthError::new(format!(
                    "Unexpected token type: {token_type}"
                )));
            }
        }
        Ok(())
    }

    /// Absolute expiry for a response received at `now`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when `expires_in` is negative or too large to
    /// be represented as a timestamp.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, AuthError> {
        let Some(secs) = self.expires_in else {
            return Ok(None);
        };
        if secs < 0 {
            return Err(AuthError::new(format!("Invalid expires_in: {secs}")));
        }
        TimeDelta::try_seconds(secs)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .map(Some)
            .ok_or_else(|| AuthError::new(format!("Invalid expires_in: {secs}")))
    }

    pub fn scope_set(&self) -> BTreeSet<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Subset of the current-user profile the client cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateUser {
    pub id: String,
    pub display_name: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
    pub email: Option<String>,
}

impl PrivateUser {
    pub fn is_premium(&self) -> bool {
        self.product.as_deref() == Some("premium")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowedArtistsResponse {
    pub artists: ArtistsContainer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistsContainer {
    pub items: Vec<Artist>,
    pub next: Option<String>,
    pub cursors: Option<Cursors>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursors {
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumResponse {
    pub items: Vec<Album>,
    pub next: Option<String>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub release_date: String,
    pub release_date_precision: String,
    pub album_type: String,
    pub artists: Vec<AlbumArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumArtist {
    pub id: String,
    pub name: String,
}
