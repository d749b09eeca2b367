use reqwest::Method;
use serde_json::Value;

use crate::{
    error::Result,
    spotify::{Spotify, request::RequestSpec},
};

impl Spotify {
    /// Searches the catalog.
    ///
    /// `types` takes any of `album`, `artist`, `playlist`, `track`, sent comma-joined.
    pub async fn search(
        &mut self,
        q: &str,
        types: &[&str],
        market: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Value> {
        self.request(
            RequestSpec::new(Method::GET, "/search")
                .query("q", Some(q))
                .query("type", Some(types))
                .query("market", market)
                .query("limit", limit)
                .locale("market"),
        )
        .await
    }

    pub async fn new_releases(
        &mut self,
        country: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Value> {
        self.request(
            RequestSpec::new(Method::GET, "/browse/new-releases")
                .query("country", country)
                .query("limit", limit)
                .query("offset", offset)
                .locale("country"),
        )
        .await
    }

    /// Follows the `next` link of a paged response.
    ///
    /// Returns `{}` when there is no next page.
    pub async fn next_page(&mut self, response: &Value) -> Result<Value> {
        self.follow_link(response, "next").await
    }

    /// Follows the `previous` link of a paged response.
    ///
    /// Returns `{}` when there is no previous page.
    pub async fn previous_page(&mut self, response: &Value) -> Result<Value> {
        self.follow_link(response, "previous").await
    }

    async fn follow_link(&mut self, response: &Value, key: &str) -> Result<Value> {
        match find_key(response, key).and_then(Value::as_str) {
            Some(url) => {
                self.request_nullable(RequestSpec::absolute(Method::GET, url))
                    .await
            }
            None => Ok(Value::Object(Default::default())),
        }
    }
}

/// Depth-first lookup of the first non-null `key` in a JSON document.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}
