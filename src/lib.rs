//! Spotify Web API Client Library
//!
//! This library provides an OAuth 2.0 aware client for the Spotify Web API. It
//! manages client-credentials and authorization-code tokens, refreshes them
//! transparently when the provider reports expiry, and classifies failures
//! into authorization and API errors.
//!
//! # Modules
//!
//! - `config` - Client options, provider endpoints and environment loading
//! - `error` - `AuthError` / `ApiError` and the crate `Result`
//! - `management` - On-disk persistence of user credentials
//! - `spotify` - Client facade, auth manager, dispatcher, transport and resources
//! - `types` - Credential models and response types
//! - `utils` - PKCE, state nonce and header helpers
//!
//! # Example
//!
//! ```
//! use sporlclient::{config, spotify::Spotify};
//!
//! #[tokio::main]
//! async fn main() -> sporlclient::Result<()> {
//!     let creds = config::client_credentials().expect("client credentials");
//!     let mut spotify = Spotify::new(config::ClientConfig::from_env(), creds).expect("client");
//!     spotify.authorize_client_creds().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod management;
pub mod spotify;
pub mod types;
pub mod utils;

pub use error::{ApiError, ApiErrorKind, AuthError, Result, SpotifyError};
