//! The HTTP transport seam.
//!
//! The dispatch layer never talks to `reqwest` directly. It hands a
//! [`RequestDescriptor`] and a deadline to a [`Transport`] and gets back a raw
//! [`HttpResponse`]. [`ReqwestTransport`] is the production implementation and
//! owns the connection-level policies: retrying `429` on idempotent methods
//! with exponential backoff, and caching `GET` responses by ETag.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::ClientConfig,
    spotify::request::{Body, RequestDescriptor},
};

/// Raw response as returned by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Sends one prepared request and returns the raw response.
///
/// Implementations must signal an expired deadline with [`TransportError::Timeout`]
/// and must return non-success statuses as responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
struct CachedResponse {
    etag: String,
    response: HttpResponse,
}

/// ETag cache for the credentials currently in use.
///
/// Entries are keyed by URL and query. A request carrying a different
/// `Authorization` value than the stored entries empties the cache, so a token
/// refresh never leaves stale entries behind. Beyond `capacity` entries the
/// oldest one is evicted.
#[derive(Debug)]
struct ResponseCache {
    capacity: usize,
    authorization: Option<String>,
    entries: HashMap<String, CachedResponse>,
    order: VecDeque<String>,
}

impl ResponseCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            authorization: None,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, authorization: Option<&str>, key: &str) -> Option<CachedResponse> {
        if self.authorization.as_deref() != authorization {
            return None;
        }
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, authorization: Option<&str>, key: String, entry: CachedResponse) {
        if self.capacity == 0 {
            return;
        }
        if self.authorization.as_deref() != authorization {
            debug!("Credentials changed, dropping {} cached responses", self.entries.len());
            self.entries.clear();
            self.order.clear();
            self.authorization = authorization.map(str::to_string);
        }

        if self.entries.insert(key.clone(), entry).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.order.push_back(key);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// `reqwest`-backed [`Transport`] with 429 backoff and an ETag cache.
pub struct ReqwestTransport {
    client: Client,
    max_retries: u32,
    backoff_factor: f64,
    cache: Option<Mutex<ResponseCache>>,
}

impl ReqwestTransport {
    /// Builds the HTTP client from `config`.
    ///
    /// # Errors
    ///
    /// Fails when the proxy URL is invalid or the TLS backend cannot be set up.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            cache: config
                .cache
                .then(|| Mutex::new(ResponseCache::new(config.cache_capacity))),
        })
    }

    /// Number of responses currently held by the ETag cache.
    pub fn cached_responses(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().ok().map(|guard| guard.len()))
            .unwrap_or(0)
    }

    fn backoff(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let exponential = self.backoff_factor * 2f64.powi(attempt.saturating_sub(1) as i32);
        let exponential = Duration::from_secs_f64(exponential.clamp(0.0, 3600.0));
        match retry_after {
            Some(secs) => exponential.max(Duration::from_secs(secs)),
            None => exponential,
        }
    }

    fn cache_key(request: &RequestDescriptor) -> String {
        let query = request
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", request.url, query)
    }

    fn cached(&self, request: &RequestDescriptor, key: &str) -> Option<CachedResponse> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().ok()?;
        guard.get(request.header("Authorization"), key)
    }

    fn store(&self, request: &RequestDescriptor, key: String, response: &HttpResponse) {
        let (Some(cache), Some(etag)) = (self.cache.as_ref(), response.header("etag")) else {
            return;
        };
        if let Ok(mut guard) = cache.lock() {
            guard.insert(
                request.header("Authorization"),
                key,
                CachedResponse {
                    etag: etag.to_string(),
                    response: response.clone(),
                },
            );
        }
    }

    async fn send_once(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
        if_none_match: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .timeout(timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(etag) = if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, etag);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &RequestDescriptor,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let cache_key = (request.method == reqwest::Method::GET).then(|| Self::cache_key(request));
        let cached = cache_key
            .as_deref()
            .and_then(|key| self.cached(request, key));

        let mut attempt = 0;
        loop {
            let response = self
                .send_once(request, timeout, cached.as_ref().map(|c| c.etag.as_str()))
                .await?;

            if response.status == StatusCode::NOT_MODIFIED.as_u16() {
                if let Some(hit) = &cached {
                    debug!("{} {} served from cache", request.method, request.url);
                    return Ok(hit.response.clone());
                }
            }

            if response.status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                && request.is_idempotent()
                && attempt < self.max_retries
            {
                attempt += 1;
                let retry_after = response
                    .header("retry-after")
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let delay = self.backoff(attempt, retry_after);
                warn!(
                    "Rate limited on {} {}, retry {}/{} in {:?}",
                    request.method, request.url, attempt, self.max_retries, delay
                );
                sleep(delay).await;
                continue;
            }

            if response.is_success() {
                if let Some(key) = &cache_key {
                    self.store(request, key.clone(), &response);
                }
            }
            return Ok(response);
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Http(err)
    }
}
