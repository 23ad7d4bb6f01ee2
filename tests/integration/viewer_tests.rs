//! Viewer integration tests.
//!
//! The page tests go through the router directly. The session tests bind a
//! real listener and drive [`ViewerSession`] over HTTP: login, upload, click
//! to inspect, double-click to annotate, search to highlight.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tokio::net::TcpListener;

use model_viewer::error::ClientError;
use model_viewer::viewer::{MarkerState, Pointer, ViewerSession};

use super::test_utils::{valve_quad_obj, TestApp, TEST_PASSWORD, TEST_USER};

/// Serve the app on an ephemeral port and return its base URL.
async fn spawn_server(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// An 800x600 canvas pointer.
fn pointer(x: f32, y: f32) -> Pointer {
    Pointer::new(x, y, 800.0, 600.0)
}

// =============================================================================
// Viewer Page
// =============================================================================

#[tokio::test]
async fn test_viewer_page_served_at_root() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, bytes) = app.send(request).await;
    let body = String::from_utf8(bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<!DOCTYPE html>"));
    assert!(body.contains("/api/login"));
    assert!(body.contains(r#"data-initial-model="""#));
}

#[tokio::test]
async fn test_viewer_page_content_type() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn test_viewer_page_initial_model() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .uri("/?model=/models/42.gltf")
        .body(Body::empty())
        .unwrap();
    let (_, body) = app.send(request).await;
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(r#"data-initial-model="/models/42.gltf""#));

    let request = Request::builder()
        .uri("/?model=https://elsewhere.example/x.gltf")
        .body(Body::empty())
        .unwrap();
    let (_, body) = app.send(request).await;
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains(r#"data-initial-model="""#));
    assert!(!html.contains("elsewhere.example"));
}

// =============================================================================
// Viewer Session
// =============================================================================

#[tokio::test]
async fn test_session_requires_login() {
    let app = TestApp::new().await;
    let base_url = spawn_server(&app).await;
    let mut session = ViewerSession::connect(base_url);

    let health = session.client().health().await.unwrap();
    assert_eq!(health.status, "healthy");

    assert!(matches!(
        session.refresh_annotations().await,
        Err(ClientError::NotAuthenticated)
    ));

    let err = session.login(TEST_USER, "wrong").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Status { status: 401, ref error, .. } if error == "invalid_credentials"),
        "{:?}",
        err
    );
    assert!(!session.client().is_authenticated());
}

#[tokio::test]
async fn test_session_upload_inspect_annotate_search() {
    let app = TestApp::new().await;
    let base_url = spawn_server(&app).await;
    let mut session = ViewerSession::connect(base_url);

    session.login(TEST_USER, TEST_PASSWORD).await.unwrap();
    assert!(session.client().is_authenticated());
    assert!(session.context().markers().is_empty());

    // Upload: the quad spans [-1, 1] in x and y on the z = 0 plane
    let url = session
        .upload_and_load("plant.obj", valve_quad_obj())
        .await
        .unwrap();
    assert!(url.starts_with("/models/"));
    assert_eq!(session.context().model_url(), Some(url.as_str()));

    // Click slightly right of center to stay off the quad's diagonal
    let inspection = session.click(&pointer(420.0, 300.0)).await.unwrap().unwrap();
    assert_eq!(inspection.component_id, "valve-1");
    assert_eq!(inspection.metadata["type"], "valve");
    assert_eq!(
        session.context().selection().unwrap().component_id,
        "valve-1"
    );

    // Far corner of the canvas misses the model
    assert!(session.click(&pointer(5.0, 5.0)).await.unwrap().is_none());

    // Double-click at the center lands on the ground at the origin
    let annotation = session
        .double_click(&pointer(400.0, 300.0), "inspect valve")
        .await
        .unwrap()
        .unwrap();
    assert!(annotation.x.abs() < 1e-3);
    assert!(annotation.y.abs() < 1e-3);
    assert!(annotation.z.abs() < 1e-3);
    assert_eq!(annotation.note, "inspect valve");

    let markers = session.context().markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].state, MarkerState::Confirmed { id: annotation.id });

    // The top edge looks above the horizon
    assert!(session
        .double_click(&pointer(400.0, 0.0), "sky")
        .await
        .unwrap()
        .is_none());
    assert_eq!(session.context().markers().len(), 1);

    // Search highlights the matching component
    let ids = session.search("valve", 10.0).await.unwrap();
    assert_eq!(ids, vec!["valve-1".to_string()]);
    assert!(session.context().is_highlighted("valve-1"));

    session.clear_highlights();
    assert!(!session.context().is_highlighted("valve-1"));

    // A fresh session sees the stored annotation
    let mut other = ViewerSession::connect(session.client().base_url().to_string());
    other.login(TEST_USER, TEST_PASSWORD).await.unwrap();
    assert_eq!(other.context().markers().len(), 1);
}
