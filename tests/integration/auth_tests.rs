//! Authentication integration tests.
//!
//! Tests verify:
//! - Login with valid and invalid credentials
//! - Bearer token enforcement on every protected route
//! - Expired, forged and malformed tokens
//! - Public routes stay reachable without a token

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;

use model_viewer::server::TokenAuth;

use super::test_utils::{
    login_request, MockRepository, TestApp, TEST_PASSWORD, TEST_USER, TEST_USER_ID,
};

fn get_with_auth(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn error_type(body: &[u8]) -> String {
    let json: Value = serde_json::from_slice(body).unwrap();
    json["error"].as_str().unwrap_or_default().to_string()
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_success_returns_verifiable_token() {
    let app = TestApp::new().await;

    let (status, body) = app.send(login_request(TEST_USER, TEST_PASSWORD)).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    let token = json["token"].as_str().unwrap();
    let claims = app.auth.verify(token).unwrap();
    assert_eq!(claims.id, TEST_USER_ID);
    assert_eq!(claims.username, TEST_USER);
    assert!(claims.exp > claims.iat);
}

#[tokio::test]
async fn test_login_wrong_password_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.send(login_request(TEST_USER, "wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "invalid_credentials");
}

#[tokio::test]
async fn test_login_unknown_user_indistinguishable_from_wrong_password() {
    let app = TestApp::new().await;

    let (unknown_status, unknown_body) = app.send(login_request("mallory", "x")).await;
    let (wrong_status, wrong_body) = app.send(login_request(TEST_USER, "x")).await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, wrong_status);
    assert_eq!(unknown_body, wrong_body);
}

#[tokio::test]
async fn test_login_database_down_is_server_error() {
    let app = TestApp::with_repository(MockRepository::failing()).await;

    let (status, body) = app.send(login_request(TEST_USER, TEST_PASSWORD)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_type(&body), "database_error");
}

#[tokio::test]
async fn test_login_does_not_require_token() {
    let app = TestApp::new().await;
    let (status, _) = app.send(login_request(TEST_USER, TEST_PASSWORD)).await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Token Guard
// =============================================================================

#[tokio::test]
async fn test_missing_token_rejected_on_every_protected_route() {
    let app = TestApp::new().await;

    for uri in [
        "/api/metadata/valve-1",
        "/api/search?type=valve&pressureMin=1",
        "/api/annotations",
    ] {
        let (status, body) = app.send(get_with_auth(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "missing_token");
        assert_eq!(json["message"], "No token");
    }

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/annotations")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"x":0,"y":0,"z":0,"note":"n"}"#))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_accepted() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(get_with_auth("/api/annotations", Some(&app.bearer())))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let app = TestApp::new().await;
    let header = format!("bearer {}", app.token());
    let (status, _) = app
        .send(get_with_auth("/api/annotations", Some(&header)))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_garbage_token_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(get_with_auth("/api/annotations", Some("Bearer not.a.jwt")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "invalid_token");
}

#[tokio::test]
async fn test_malformed_header_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(get_with_auth("/api/annotations", Some("Basic YWxpY2U6cHc=")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "malformed_header");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new().await;
    let past = chrono::Utc::now().timestamp() - 60;
    let token = app
        .auth
        .issue_with_expiry(TEST_USER_ID, TEST_USER, past)
        .unwrap();

    let (status, body) = app
        .send(get_with_auth(
            "/api/annotations",
            Some(&format!("Bearer {}", token)),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "token_expired");
}

#[tokio::test]
async fn test_token_from_other_secret_rejected() {
    let app = TestApp::new().await;
    let other = TokenAuth::new("some-other-secret", Duration::from_secs(3600));
    let (token, _) = other.issue(TEST_USER_ID, TEST_USER).unwrap();

    let (status, body) = app
        .send(get_with_auth(
            "/api/annotations",
            Some(&format!("Bearer {}", token)),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "invalid_token");
}

// =============================================================================
// Public Routes
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(get_with_auth("/health", None)).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_api_path_is_not_found_without_token() {
    let app = TestApp::new().await;
    let (status, _) = app.send(get_with_auth("/api/does-not-exist", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
