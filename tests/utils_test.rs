use serde_json::json;
use sporlclient::{
    error::{envelope_message, error_message},
    spotify::transport::HttpResponse,
    utils::*,
};

#[test]
fn test_generate_code_verifier() {
    let verifier = generate_code_verifier();

    // Should be exactly 128 characters
    assert_eq!(verifier.len(), 128);

    // Should contain only alphanumeric characters
    assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));

    // Two generated verifiers should be different
    let verifier2 = generate_code_verifier();
    assert_ne!(verifier, verifier2);
}

#[test]
fn test_generate_code_challenge() {
    let verifier = "test_verifier_123";
    let challenge = generate_code_challenge(verifier);

    assert!(!challenge.is_empty());

    // Deterministic for the same input
    assert_eq!(challenge, generate_code_challenge(verifier));
    assert_ne!(challenge, generate_code_challenge("different_verifier"));

    // URL-safe base64 without padding
    assert!(
        challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    );
}

#[test]
fn test_generate_state() {
    let state = generate_state();

    assert_eq!(state.len(), 64);
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(state, generate_state());
}

#[test]
fn test_auth_header_values() {
    assert_eq!(basic_auth_value("abc", "xyz"), "Basic YWJjOnh5eg==");
    assert_eq!(bearer_auth_value("tok1"), "Bearer tok1");
}

#[test]
fn test_comma_join() {
    assert_eq!(comma_join(&["a", "b", "c"]), "a,b,c");
    assert_eq!(comma_join(&["only"]), "only");
    assert_eq!(comma_join::<&str>(&[]), "");
}

#[test]
fn test_to_uri() {
    assert_eq!(to_uri("track", "123"), "spotify:track:123");
    assert_eq!(to_uri("track", "spotify:album:9"), "spotify:album:9");
}

#[test]
fn test_error_message_shapes() {
    let envelope = HttpResponse::json_body(
        404,
        &json!({ "error": { "status": 404, "message": "Not found." } }),
    );
    let oauth = HttpResponse::json_body(
        400,
        &json!({ "error": "invalid_grant", "error_description": "Invalid refresh token" }),
    );
    let bare = HttpResponse::json_body(400, &json!({ "error": "invalid_request" }));
    let raw = HttpResponse::new(500, "upstream exploded");

    assert_eq!(error_message(&envelope), "Not found.");
    assert_eq!(error_message(&oauth), "Invalid refresh token");
    assert_eq!(error_message(&bare), "invalid_request");
    assert_eq!(error_message(&raw), "upstream exploded");

    assert_eq!(envelope_message(&envelope).as_deref(), Some("Not found."));
    assert_eq!(envelope_message(&oauth), None);
}

#[test]
fn test_http_response_helpers() {
    let response = HttpResponse::new(204, "  \n").with_header("ETag", "\"x\"");

    assert!(response.is_empty());
    assert!(response.is_success());
    assert_eq!(response.header("etag"), Some("\"x\""));
    assert!(!HttpResponse::new(401, "").is_success());
}
