use reqwest::Method;
use serde_json::{Value, json};

use crate::{
    error::Result,
    spotify::{Spotify, request::RequestSpec},
};

impl Spotify {
    pub async fn tracks(&mut self, track_ids: &[&str], market: Option<&str>) -> Result<Value> {
        self.request(
            RequestSpec::new(Method::GET, "/tracks")
                .query("ids", Some(track_ids))
                .query("market", market)
                .locale("market"),
        )
        .await
    }

    /// Tracks saved in the user's library.
    pub async fn user_tracks(
        &mut self,
        market: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Value> {
        self.request(
            RequestSpec::new(Method::GET, "/me/tracks")
                .query("market", market)
                .query("limit", limit)
                .query("offset", offset)
                .locale("market"),
        )
        .await
    }

    pub async fn save_tracks(&mut self, track_ids: &[&str]) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::PUT, "/me/tracks").json(json!({ "ids": track_ids })),
        )
        .await
    }

    pub async fn delete_tracks(&mut self, track_ids: &[&str]) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::DELETE, "/me/tracks").json(json!({ "ids": track_ids })),
        )
        .await
    }
}
