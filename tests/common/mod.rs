#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use sporlclient::{
    config::{ClientConfig, TOKEN_EXPIRED_MSG},
    spotify::{
        Spotify,
        request::{Body, RequestDescriptor},
        transport::{HttpResponse, Transport, TransportError},
    },
    types::{ClientCredentials, UserCredentials},
};

pub const TOKEN_URL: &str = "https://accounts.test/api/token";
pub const API_URL: &str = "https://api.test/v1";
pub const AUTHORIZE_URL: &str = "https://accounts.test/authorize";

/// Transport that replays scripted responses and records every request it sees.
#[derive(Default)]
pub struct SpyTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: Mutex<Vec<RequestDescriptor>>,
}

impl SpyTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: HttpResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(HttpResponse::json_body(status, &body));
    }

    pub fn push_timeout(&self) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Timeout));
    }

    pub fn push_token(&self, access_token: &str) {
        self.push_json(
            200,
            json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "expires_in": 3600,
            }),
        );
    }

    pub fn push_expired(&self) {
        self.push_json(
            401,
            json!({ "error": { "status": 401, "message": TOKEN_EXPIRED_MSG } }),
        );
    }

    pub fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::InvalidRequest("no scripted response".into())))
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        api_url: API_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        authorize_url: AUTHORIZE_URL.to_string(),
        populate_user_creds: false,
        ..ClientConfig::default()
    }
}

pub fn client_creds() -> ClientCredentials {
    ClientCredentials::new("abc", "xyz")
        .with_redirect_uri("http://localhost/callback")
        .with_scopes(["user-read-private", "user-follow-read"])
}

pub fn spotify(spy: &Arc<SpyTransport>) -> Spotify {
    spotify_with(spy, test_config())
}

pub fn spotify_with(spy: &Arc<SpyTransport>, config: ClientConfig) -> Spotify {
    Spotify::with_transport(config, client_creds(), spy.clone())
}

pub fn user_creds(access_token: &str, refresh_token: Option<&str>) -> UserCredentials {
    UserCredentials {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        ..Default::default()
    }
}

pub fn form_value(request: &RequestDescriptor, key: &str) -> Option<String> {
    match &request.body {
        Body::Form(fields) => fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}
