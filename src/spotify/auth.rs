use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use crate::{
    config::ClientConfig,
    error::{AuthError, Result},
    spotify::{
        dispatch::{Outcome, classify, send_raw},
        request::{Body, RequestDescriptor},
        transport::Transport,
    },
    types::{ActiveCaller, ClientCredentials, TokenResponse, UserCredentials, UserlessToken},
    utils,
};

/// Pending authorization-code flow data remembered between URL generation and callback.
#[derive(Debug, Clone, Default)]
struct PendingAuthorization {
    state: Option<String>,
    code_verifier: Option<String>,
}

/// Owns the credentials and everything that touches the OAuth token endpoint.
///
/// The manager decides which credential set is the active caller, produces the
/// `Authorization` header for outbound calls, and performs token exchanges and
/// refreshes. Credentials are mutated in place on refresh, so all access goes
/// through `&mut self`: one writer at a time.
pub struct AuthManager {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    token_url: String,
    authorize_url: String,
    enforce_state_check: bool,
    client_creds: ClientCredentials,
    client_token: Option<UserlessToken>,
    user_creds: Option<UserCredentials>,
    caller: Option<ActiveCaller>,
    pending: PendingAuthorization,
}

impl AuthManager {
    /// Creates a manager with no active caller.
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used for token-endpoint calls
    /// * `config` - Supplies the timeout, provider URLs and the state-check policy
    /// * `client_creds` - Application identity used for every grant
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config)?);
    /// let mut auth = AuthManager::new(transport, &config, ClientCredentials::new(id, secret));
    /// auth.exchange_client_credentials().await?;
    /// ```
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        client_creds: ClientCredentials,
    ) -> Self {
        Self {
            transport,
            timeout: config.timeout,
            token_url: config.token_url.clone(),
            authorize_url: config.authorize_url.clone(),
            enforce_state_check: config.enforce_state_check,
            client_creds,
            client_token: None,
            user_creds: None,
            caller: None,
            pending: PendingAuthorization::default(),
        }
    }

    /// The credential set that authorizes outbound calls, if any.
    pub fn caller(&self) -> Option<ActiveCaller> {
        self.caller
    }

    /// Application credentials used for token-endpoint calls.
    pub fn client_creds(&self) -> &ClientCredentials {
        &self.client_creds
    }

    /// Mutable access, e.g. to rotate the client secret.
    pub fn client_creds_mut(&mut self) -> &mut ClientCredentials {
        &mut self.client_creds
    }

    /// Token from the last successful client-credentials grant.
    pub fn client_token(&self) -> Option<&UserlessToken> {
        self.client_token.as_ref()
    }

    /// Installed user credentials, kept up to date across refreshes.
    pub fn user_creds(&self) -> Option<&UserCredentials> {
        self.user_creds.as_ref()
    }

    /// Mutable access to the installed user credentials.
    ///
    /// Setting `expiry` to a past instant makes the next dispatched call refresh first.
    pub fn user_creds_mut(&mut self) -> Option<&mut UserCredentials> {
        self.user_creds.as_mut()
    }

    /// Installs user credentials and makes them the active caller.
    pub fn set_user_creds(&mut self, user_creds: UserCredentials) {
        self.user_creds = Some(user_creds);
        self.caller = Some(ActiveCaller::User);
    }

    /// `Bearer` header value for the given caller.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when that caller has no access token yet.
    pub fn authorization_header(&self, caller: ActiveCaller) -> std::result::Result<String, AuthError> {
        let token = match caller {
            ActiveCaller::Client => self.client_token.as_ref().map(|t| t.access_token.as_str()),
            ActiveCaller::User => self.user_creds.as_ref().map(|c| c.access_token.as_str()),
        };
        match token {
            Some(token) if !token.is_empty() => Ok(utils::bearer_auth_value(token)),
            _ => Err(AuthError::new(format!(
                "No access token available for {caller:?} credentials"
            ))),
        }
    }

    /// Header for whichever caller is currently active.
    pub fn active_authorization_header(&self) -> std::result::Result<String, AuthError> {
        let caller = self.caller.ok_or_else(|| AuthError::new("No caller to authorize"))?;
        self.authorization_header(caller)
    }

    /// Whether the active caller's token is known to be expired.
    ///
    /// Client tokens are never treated as expired ahead of time; they are
    /// refreshed once the provider reports the expiry.
    pub fn active_is_expired(&self) -> bool {
        match self.caller {
            Some(ActiveCaller::User) => self.user_creds.as_ref().is_some_and(UserCredentials::is_expired),
            _ => false,
        }
    }

    /// Builds the URL the user visits to authorize this application.
    ///
    /// When `state` is `None` and state checking is enforced, a random state is
    /// generated. With `pkce` set, a code challenge is attached and the matching
    /// verifier is sent along at code exchange.
    pub fn authorization_url(
        &mut self,
        state: Option<String>,
        pkce: bool,
    ) -> std::result::Result<String, AuthError> {
        if self.client_creds.client_id.is_empty() {
            return Err(AuthError::new("No client id set"));
        }

        let state = state.or_else(|| self.enforce_state_check.then(utils::generate_state));
        let mut url = Url::parse(&self.authorize_url)
            .map_err(|e| AuthError::new("Invalid authorize URL").with_source(e))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_creds.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.client_creds.redirect_uri);
            if !self.client_creds.scopes.is_empty() {
                let scopes: Vec<&str> = self.client_creds.scopes.iter().map(String::as_str).collect();
                query.append_pair("scope", &scopes.join(" "));
            }
            if let Some(state) = &state {
                query.append_pair("state", state);
            }
            if self.client_creds.show_dialog {
                query.append_pair("show_dialog", "true");
            }
        }

        let code_verifier = pkce.then(utils::generate_code_verifier);
        if let Some(verifier) = &code_verifier {
            url.query_pairs_mut()
                .append_pair("code_challenge", &utils::generate_code_challenge(verifier))
                .append_pair("code_challenge_method", "S256");
        }

        self.pending = PendingAuthorization {
            state,
            code_verifier,
        };
        Ok(url.into())
    }

    /// Client-credentials grant. On success the client token becomes the active caller.
    pub async fn exchange_client_credentials(&mut self) -> Result<UserlessToken> {
        if !self.client_creds.is_complete() {
            return Err(AuthError::new("No client credentials set").into());
        }

        let request = self.token_request(vec![("grant_type", "client_credentials".to_string())]);
        let response = self
            .post_token(&request)
            .await
            .map_err(|e| e.into_auth("Failed to authenticate with client credentials"))?;

        response.validate()?;
        let token = UserlessToken {
            access_token: response.access_token.clone(),
            expiry: response
                .expiry_from(Utc::now())
                .map_err(|e| e.with_request(&request))?,
        };

        info!("Authorized with client credentials");
        self.client_token = Some(token.clone());
        self.caller = Some(ActiveCaller::Client);
        Ok(token)
    }

    /// Authorization-code grant, the second half of the user authorization flow.
    ///
    /// The `state` from the callback is compared with the one remembered by
    /// [`AuthManager::authorization_url`] before anything is sent. The new
    /// credentials are returned but not installed.
    pub async fn exchange_authorization_code(
        &mut self,
        grant: &str,
        state: Option<&str>,
    ) -> Result<UserCredentials> {
        self.verify_state(state)?;

        let mut fields = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", grant.to_string()),
            ("redirect_uri", self.client_creds.redirect_uri.clone()),
        ];
        if let Some(verifier) = &self.pending.code_verifier {
            fields.push(("code_verifier", verifier.clone()));
        }

        let request = self.token_request(fields);
        let response = self
            .post_token(&request)
            .await
            .map_err(|e| e.into_auth("Failed to exchange authorization code"))?;

        let mut creds = UserCredentials::from_token_response(&response, Utc::now())
            .map_err(|e| e.with_request(&request))?;
        creds.state = self.pending.state.take();
        self.pending.code_verifier = None;
        Ok(creds)
    }

    fn verify_state(&self, state: Option<&str>) -> std::result::Result<(), AuthError> {
        let expected = self.pending.state.as_deref();
        let matches = match state {
            Some(received) => expected == Some(received),
            None => !self.enforce_state_check,
        };
        if matches {
            Ok(())
        } else {
            Err(AuthError::new("States do not match or state not provided"))
        }
    }

    /// Refresh-token grant for the stored user credentials.
    ///
    /// Fails without touching the network when no refresh token is stored.
    pub async fn refresh_user_token(&mut self) -> Result<()> {
        let refresh_token = self
            .user_creds
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::new("Access token expired and couldn't find a refresh token to refresh it")
            })?;

        let request = self.token_request(vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token),
        ]);
        let response = self
            .post_token(&request)
            .await
            .map_err(|e| e.into_auth("Failed to refresh user access token"))?;

        let creds = self
            .user_creds
            .as_mut()
            .ok_or_else(|| AuthError::new("User credentials disappeared during refresh"))?;
        creds
            .apply_refresh(&response, Utc::now())
            .map_err(|e| e.with_request(&request))?;
        debug!("Refreshed user access token");
        Ok(())
    }

    /// Refreshes whichever caller is active.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when there is no active caller, when the token
    /// endpoint call fails, or when the provider hands back the access token
    /// that was already in use.
    pub async fn refresh(&mut self) -> Result<()> {
        let caller = self
            .caller
            .ok_or_else(|| AuthError::new("No caller to refresh token for"))?;
        let previous = self.authorization_header(caller).ok();

        match caller {
            ActiveCaller::User => self.refresh_user_token().await?,
            ActiveCaller::Client => {
                self.exchange_client_credentials().await?;
            }
        }

        if previous.is_some() && self.authorization_header(caller).ok() == previous {
            return Err(AuthError::new("Token refresh returned the same access token").into());
        }
        Ok(())
    }

    fn token_request(&self, fields: Vec<(&str, String)>) -> RequestDescriptor {
        let mut request = RequestDescriptor::new(Method::POST, &self.token_url);
        request.set_header(
            "Authorization",
            utils::basic_auth_value(&self.client_creds.client_id, &self.client_creds.client_secret),
        );
        request.set_header("Content-Type", "application/x-www-form-urlencoded");
        request.body = Body::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        );
        request
    }

    async fn post_token(&self, request: &RequestDescriptor) -> Result<TokenResponse> {
        let response = send_raw(self.transport.as_ref(), request, self.timeout).await?;
        let response = match classify(request, response) {
            Outcome::Success(response) => response,
            Outcome::TokenExpired(response) => {
                return Err(AuthError::new("Token endpoint rejected the request")
                    .with_request(request)
                    .with_response(&response)
                    .into());
            }
            Outcome::Failed(err) => return Err(err),
        };
        response.json::<TokenResponse>().map_err(|e| {
            AuthError::new("Malformed token endpoint response")
                .with_request(request)
                .with_response(&response)
                .with_source(e)
                .into()
        })
    }
}
