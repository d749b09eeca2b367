use reqwest::Method;
use serde_json::Value;

use crate::{
    error::Result,
    spotify::{Spotify, request::RequestSpec},
    types::{AlbumResponse, FollowedArtistsResponse},
};

impl Spotify {
    /// Retrieves several artists by id.
    pub async fn artists(&mut self, artist_ids: &[&str]) -> Result<Value> {
        self.request(RequestSpec::new(Method::GET, "/artists").query("ids", Some(artist_ids)))
            .await
    }

    /// Retrieves a page of artists followed by the current user.
    ///
    /// Uses cursor-based pagination: pass `artists.cursors.after` from the
    /// previous page as `after` to continue.
    ///
    /// # Arguments
    ///
    /// * `after` - Optional cursor, the last artist id of the previous page
    /// * `limit` - Maximum number of artists to return (1-50)
    ///
    /// # Example
    ///
    /// ```
    /// let page = spotify.followed_artists(None, Some(20)).await?;
    /// if let Some(cursor) = page.artists.cursors.and_then(|c| c.after) {
    ///     let next = spotify.followed_artists(Some(&cursor), Some(20)).await?;
    /// }
    /// ```
    pub async fn followed_artists(
        &mut self,
        after: Option<&str>,
        limit: Option<u32>,
    ) -> Result<FollowedArtistsResponse> {
        self.request(
            RequestSpec::new(Method::GET, "/me/following")
                .query("type", Some("artist"))
                .query("after", after)
                .query("limit", limit),
        )
        .await
    }

    pub async fn follow_artists(&mut self, artist_ids: &[&str]) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::PUT, "/me/following")
                .query("type", Some("artist"))
                .query("ids", Some(artist_ids)),
        )
        .await
    }

    pub async fn unfollow_artists(&mut self, artist_ids: &[&str]) -> Result<Value> {
        self.request_nullable(
            RequestSpec::new(Method::DELETE, "/me/following")
                .query("type", Some("artist"))
                .query("ids", Some(artist_ids)),
        )
        .await
    }

    /// Retrieves albums of an artist, optionally filtered by release group.
    ///
    /// `include_groups` accepts `album`, `single`, `appears_on` and `compilation`.
    /// The market defaults to the user's country when locale injection is enabled.
    pub async fn artist_albums(
        &mut self,
        artist_id: &str,
        include_groups: Option<&[&str]>,
        market: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<AlbumResponse> {
        self.request(
            RequestSpec::new(Method::GET, "/artists/{id}/albums")
                .path("id", artist_id)
                .query("include_groups", include_groups)
                .query("market", market)
                .query("limit", limit)
                .query("offset", offset)
                .locale("market"),
        )
        .await
    }
}
