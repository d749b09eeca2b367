use reqwest::Method;
use serde_json::{Value, json};

use crate::{
    error::Result,
    spotify::{Spotify, request::RequestSpec},
    utils,
};

impl Spotify {
    /// Lists the user's available devices.
    pub async fn devices(&mut self) -> Result<Value> {
        self.request(RequestSpec::new(Method::GET, "/me/player/devices"))
            .await
    }

    /// Starts or resumes playback.
    ///
    /// With a `resource_id`, plays that resource: tracks are sent as `uris`,
    /// anything else (album, artist, playlist) as `context_uri`. The response
    /// body is empty on success.
    pub async fn play(
        &mut self,
        resource_id: Option<&str>,
        resource_type: &str,
        device_id: Option<&str>,
        position_ms: Option<u32>,
    ) -> Result<Value> {
        let body = match resource_id {
            Some(id) if resource_type == "track" => json!({
                "uris": [utils::to_uri(resource_type, id)],
                "position_ms": position_ms,
            }),
            Some(id) => json!({
                "context_uri": utils::to_uri(resource_type, id),
                "position_ms": position_ms,
            }),
            None => json!({ "position_ms": position_ms }),
        };

        self.request_nullable(
            RequestSpec::new(Method::PUT, "/me/player/play")
                .query("device_id", device_id)
                .json(body),
        )
        .await
    }

    pub async fn pause(&mut self, device_id: Option<&str>) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::PUT, "/me/player/pause").query("device_id", device_id),
        )
        .await
    }

    pub async fn next(&mut self, device_id: Option<&str>) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::POST, "/me/player/next").query("device_id", device_id),
        )
        .await
    }

    pub async fn volume(&mut self, volume_percent: u32, device_id: Option<&str>) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::PUT, "/me/player/volume")
                .query("volume_percent", Some(volume_percent))
                .query("device_id", device_id),
        )
        .await
    }

    /// Currently playing item; empty when nothing is playing.
    pub async fn currently_playing(&mut self, market: Option<&str>) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::GET, "/me/player/currently-playing")
                .query("market", market)
                .locale("market"),
        )
        .await
    }
}
