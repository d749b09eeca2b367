//! Configuration management for the Spotify client.
//!
//! This module holds the runtime options consumed by the dispatch layer and the
//! default transport, and it handles loading credentials from environment
//! variables and `.env` files.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, path::PathBuf, time::Duration};

use crate::{
    error::ConfigError,
    types::{ClientCredentials, UserCredentials},
};

pub const BASE_URI: &str = "https://api.spotify.com/v1";
pub const OAUTH_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const OAUTH_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Message the provider puts in a `401` body when the access token has expired.
pub const TOKEN_EXPIRED_MSG: &str = "The access token expired";

/// Runtime options for a [`crate::spotify::Spotify`] client.
///
/// # Fields
///
/// * `timeout` - Deadline handed to the transport for every call
/// * `max_retries` - How often the transport retries a `429` on idempotent methods
/// * `backoff_factor` - Multiplier for the transport's exponential backoff
/// * `enforce_state_check` - Reject authorization callbacks whose `state` is missing or wrong
/// * `default_to_locale` - Inject the user's country into locale-aware requests
/// * `cache` - Let the transport cache `GET` responses by ETag
/// * `cache_capacity` - Most responses the ETag cache holds before evicting the oldest
/// * `populate_user_creds` - Fill `user_id`/`country` from the profile after user authorization
/// * `proxy` - Optional proxy URL for all outbound traffic
/// * `api_url`, `token_url`, `authorize_url` - Provider endpoints
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub enforce_state_check: bool,
    pub default_to_locale: bool,
    pub cache: bool,
    pub cache_capacity: usize,
    pub populate_user_creds: bool,
    pub proxy: Option<String>,
    pub api_url: String,
    pub token_url: String,
    pub authorize_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(7),
            max_retries: 10,
            backoff_factor: 0.1,
            enforce_state_check: true,
            default_to_locale: true,
            cache: true,
            cache_capacity: 256,
            populate_user_creds: true,
            proxy: None,
            api_url: BASE_URI.to_string(),
            token_url: OAUTH_TOKEN_URL.to_string(),
            authorize_url: OAUTH_AUTHORIZE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Builds a config from defaults, overriding endpoints from the environment.
    ///
    /// Reads `SPOTIFY_API_URL`, `SPOTIFY_API_TOKEN_URL` and `SPOTIFY_API_AUTH_URL`
    /// when present. Useful for pointing the client at a local mock server.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = optional_var("SPOTIFY_API_URL") {
            config.api_url = url;
        }
        if let Some(url) = optional_var("SPOTIFY_API_TOKEN_URL") {
            config.token_url = url;
        }
        if let Some(url) = optional_var("SPOTIFY_API_AUTH_URL") {
            config.authorize_url = url;
        }
        config
    }
}

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the necessary directory structure if it doesn't exist and loads
/// environment variables from a `.env` file located in the platform-specific
/// local data directory under `sporlclient/.env`.
///
/// # Directory Structure
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/sporlclient/.env`
/// - macOS: `~/Library/Application Support/sporlclient/.env`
/// - Windows: `%LOCALAPPDATA%/sporlclient/.env`
///
/// # Errors
///
/// This function will return an error if:
/// - The parent directory cannot be created
/// - The `.env` file cannot be read or parsed
pub async fn load_env() -> Result<(), ConfigError> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    dotenv::from_path(path)?;
    Ok(())
}

pub fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("sporlclient/.env");
    path
}

/// Reads the client credentials from the environment.
///
/// `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET` are required,
/// `SPOTIFY_REDIRECT_URI` is optional.
pub fn client_credentials() -> Result<ClientCredentials, ConfigError> {
    let creds = ClientCredentials::new(
        required_var("SPOTIFY_CLIENT_ID")?,
        required_var("SPOTIFY_CLIENT_SECRET")?,
    );
    Ok(match optional_var("SPOTIFY_REDIRECT_URI") {
        Some(uri) => creds.with_redirect_uri(uri),
        None => creds,
    })
}

/// Reads a pre-issued user access token from the environment, if any.
///
/// Uses `SPOTIFY_ACCESS_TOKEN` and, when set, `SPOTIFY_USER_ID`.
pub fn user_credentials() -> Option<UserCredentials> {
    let mut creds = UserCredentials::from_access_token(optional_var("SPOTIFY_ACCESS_TOKEN")?);
    creds.user_id = optional_var("SPOTIFY_USER_ID");
    Some(creds)
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
