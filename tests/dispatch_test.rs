mod common;

use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::json;
use sporlclient::{
    ApiErrorKind, SpotifyError,
    spotify::{request::RequestSpec, transport::HttpResponse},
};

use common::*;

fn devices_spec() -> RequestSpec {
    RequestSpec::new(Method::GET, "/me/player/devices")
}

#[tokio::test]
async fn test_success_attaches_active_user_header() {
    let spy = SpyTransport::new();
    spy.push_json(200, json!({ "devices": [] }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("user-tok", None));

    let devices = spotify.devices().await.unwrap();

    assert_eq!(devices, json!({ "devices": [] }));
    let calls = spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, format!("{API_URL}/me/player/devices"));
    assert_eq!(calls[0].header("Authorization"), Some("Bearer user-tok"));
}

#[tokio::test]
async fn test_expired_token_refreshes_once_and_retries() {
    let spy = SpyTransport::new();
    spy.push_expired();
    spy.push_token("new");
    spy.push_json(200, json!({ "devices": ["speaker"] }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", Some("r1")));

    let devices = spotify.devices().await.unwrap();

    assert_eq!(devices, json!({ "devices": ["speaker"] }));
    let calls = spy.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].header("Authorization"), Some("Bearer old"));
    assert_eq!(calls[1].url, TOKEN_URL);
    assert_eq!(form_value(&calls[1], "grant_type").as_deref(), Some("refresh_token"));
    assert_eq!(calls[2].url, calls[0].url);
    assert_eq!(calls[2].header("Authorization"), Some("Bearer new"));

    let creds = spotify.user_creds().unwrap();
    assert_eq!(creds.access_token, "new");
    assert_eq!(creds.refresh_token.as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_second_unauthorized_after_retry_is_terminal() {
    let spy = SpyTransport::new();
    spy.push_expired();
    spy.push_token("new");
    spy.push_expired();
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", Some("r1")));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(err.http_response().map(|r| r.status), Some(401));
    assert_eq!(spy.call_count(), 3);

    // Same state, same path: one refresh, one retry, same failure.
    spy.push_expired();
    spy.push_token("newer");
    spy.push_expired();

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(spy.call_count(), 6);
}

#[tokio::test]
async fn test_other_unauthorized_fails_without_refresh() {
    let spy = SpyTransport::new();
    spy.push_json(
        401,
        json!({ "error": { "status": 401, "message": "Invalid access token" } }),
    );
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", Some("r1")));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    match err {
        SpotifyError::Auth(auth) => assert_eq!(auth.msg, "Invalid access token"),
        other => panic!("expected auth error, got {other:?}"),
    }
    assert_eq!(spy.call_count(), 1);
}

#[tokio::test]
async fn test_unauthorized_uses_error_description() {
    let spy = SpyTransport::new();
    spy.push_json(
        401,
        json!({ "error": "invalid_token", "error_description": "Token revoked" }),
    );
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", None));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    match err {
        SpotifyError::Auth(auth) => assert_eq!(auth.msg, "Token revoked"),
        other => panic!("expected auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_is_api_error_with_provider_message() {
    let spy = SpyTransport::new();
    spy.push_json(404, json!({ "error": { "status": 404, "message": "Not found." } }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    match err {
        SpotifyError::Api(api) => {
            assert_eq!(api.kind, ApiErrorKind::Status(404));
            assert_eq!(api.msg, "Not found.");
            assert!(api.http_request.is_some());
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_falls_back_to_raw_body() {
    let spy = SpyTransport::new();
    spy.push(HttpResponse::new(502, "bad gateway"));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    match err {
        SpotifyError::Api(api) => {
            assert_eq!(api.kind, ApiErrorKind::Status(502));
            assert_eq!(api.msg, "bad gateway");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_is_api_error_without_retry() {
    let spy = SpyTransport::new();
    spy.push_timeout();
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", Some("r1")));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(spy.call_count(), 1);
}

#[tokio::test]
async fn test_refresh_impossible_during_retry_is_auth_error() {
    let spy = SpyTransport::new();
    spy.push_expired();
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", None));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(spy.call_count(), 1);
}

#[tokio::test]
async fn test_refresh_rejected_by_token_endpoint_is_auth_error() {
    let spy = SpyTransport::new();
    spy.push_expired();
    spy.push_json(
        400,
        json!({ "error": "invalid_grant", "error_description": "Refresh token revoked" }),
    );
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", Some("r1")));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(err.http_response().map(|r| r.status), Some(400));
    assert_eq!(spy.call_count(), 2);
}

#[tokio::test]
async fn test_refresh_returning_same_token_is_rejected() {
    let spy = SpyTransport::new();
    spy.push_expired();
    spy.push_token("old");
    let mut spotify = spotify(&spy).with_user_creds(user_creds("old", Some("r1")));

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(spy.call_count(), 2);
}

#[tokio::test]
async fn test_known_expired_user_token_refreshes_before_sending() {
    let spy = SpyTransport::new();
    spy.push_token("fresh");
    spy.push_json(200, json!({}));
    let mut creds = user_creds("stale", Some("r1"));
    creds.expiry = Some(Utc::now() - Duration::seconds(10));
    let mut spotify = spotify(&spy).with_user_creds(creds);

    spotify.send(devices_spec()).await.unwrap();

    let calls = spy.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].url, TOKEN_URL);
    assert_eq!(calls[1].header("Authorization"), Some("Bearer fresh"));
}

#[tokio::test]
async fn test_refresh_before_sending_rejects_same_token() {
    let spy = SpyTransport::new();
    spy.push_token("old");
    spy.push_json(200, json!({ "devices": [] }));
    let mut creds = user_creds("old", Some("r1"));
    creds.expiry = Some(Utc::now() - Duration::seconds(10));
    let mut spotify = spotify(&spy).with_user_creds(creds);

    let err = spotify.devices().await.unwrap_err();

    assert!(err.is_auth());
    let calls = spy.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, TOKEN_URL);
}

#[tokio::test]
async fn test_expired_client_token_repeats_client_grant() {
    let spy = SpyTransport::new();
    spy.push_token("tok1");
    spy.push_expired();
    spy.push_token("tok2");
    spy.push_json(200, json!({ "artists": [] }));
    let mut spotify = spotify(&spy);

    spotify.auth_mut().exchange_client_credentials().await.unwrap();
    let artists = spotify.artists(&["a1", "a2"]).await.unwrap();

    assert_eq!(artists, json!({ "artists": [] }));
    let calls = spy.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[1].query_param("ids"), Some("a1,a2"));
    assert_eq!(form_value(&calls[2], "grant_type").as_deref(), Some("client_credentials"));
    assert_eq!(calls[3].header("Authorization"), Some("Bearer tok2"));
}

#[tokio::test]
async fn test_no_caller_fails_before_sending() {
    let spy = SpyTransport::new();
    let mut spotify = spotify(&spy);

    let err = spotify.send(devices_spec()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_nullable_endpoint_with_empty_body_yields_empty_object() {
    let spy = SpyTransport::new();
    spy.push(HttpResponse::new(204, ""));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let result = spotify.pause(Some("device-1")).await.unwrap();

    assert_eq!(result, json!({}));
    let calls = spy.calls();
    assert_eq!(calls[0].method, Method::PUT);
    assert_eq!(calls[0].query_param("device_id"), Some("device-1"));
}

#[tokio::test]
async fn test_non_nullable_endpoint_with_empty_body_is_decode_error() {
    let spy = SpyTransport::new();
    spy.push(HttpResponse::new(200, ""));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let err = spotify.devices().await.unwrap_err();

    match err {
        SpotifyError::Api(api) => assert_eq!(api.kind, ApiErrorKind::Decode),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_is_active_without_caller_is_false_without_request() {
    let spy = SpyTransport::new();
    let mut spotify = spotify(&spy);

    assert!(!spotify.is_active().await.unwrap());
    assert_eq!(spy.call_count(), 0);
}

#[tokio::test]
async fn test_is_active_reflects_probe_result() {
    let spy = SpyTransport::new();
    spy.push_json(200, json!({ "tracks": { "items": [] } }));
    spy.push_json(
        401,
        json!({ "error": { "status": 401, "message": "Invalid access token" } }),
    );
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    assert!(spotify.is_active().await.unwrap());
    assert!(!spotify.is_active().await.unwrap());

    let probe = &spy.calls()[0];
    assert_eq!(probe.url, format!("{API_URL}/search"));
    assert_eq!(probe.query_param("type"), Some("track"));
}

#[tokio::test]
async fn test_is_active_propagates_api_errors() {
    let spy = SpyTransport::new();
    spy.push(HttpResponse::new(500, "boom"));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let err = spotify.is_active().await.unwrap_err();

    assert!(!err.is_auth());
}

#[tokio::test]
async fn test_authorize_client_creds_probes_with_new_token() {
    let spy = SpyTransport::new();
    spy.push_token("tok1");
    spy.push_json(200, json!({ "tracks": { "items": [] } }));
    let mut spotify = spotify(&spy);

    spotify.authorize_client_creds().await.unwrap();

    let calls = spy.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].header("Authorization"), Some("Bearer tok1"));
}

#[tokio::test]
async fn test_is_premium_reads_product() {
    let spy = SpyTransport::new();
    spy.push_json(200, json!({ "id": "u1", "product": "premium" }));
    spy.push_json(200, json!({ "id": "u1", "product": "free" }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    assert!(spotify.is_premium().await.unwrap());
    assert!(!spotify.is_premium().await.unwrap());
}

#[tokio::test]
async fn test_next_page_follows_link_or_returns_empty() {
    let spy = SpyTransport::new();
    spy.push_json(200, json!({ "items": [2], "next": null }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let page = json!({ "tracks": { "items": [1], "next": "https://api.test/v1/search?offset=1" } });
    let next = spotify.next_page(&page).await.unwrap();
    let last = spotify.next_page(&next).await.unwrap();

    assert_eq!(next["items"], json!([2]));
    assert_eq!(last, json!({}));
    assert_eq!(spy.call_count(), 1);
    assert_eq!(spy.calls()[0].url, "https://api.test/v1/search?offset=1");
}

#[tokio::test]
async fn test_previous_page_follows_link_or_returns_empty() {
    let spy = SpyTransport::new();
    spy.push_json(200, json!({ "items": [0], "previous": null }));
    let mut spotify = spotify(&spy).with_user_creds(user_creds("tok", None));

    let page = json!({
        "albums": {
            "items": [1],
            "next": "https://api.test/v1/browse/new-releases?offset=2",
            "previous": "https://api.test/v1/browse/new-releases?offset=0",
        }
    });
    let previous = spotify.previous_page(&page).await.unwrap();
    let first = spotify.previous_page(&previous).await.unwrap();

    assert_eq!(previous["items"], json!([0]));
    assert_eq!(first, json!({}));
    assert_eq!(spy.call_count(), 1);
    assert_eq!(
        spy.calls()[0].url,
        "https://api.test/v1/browse/new-releases?offset=0"
    );
}
