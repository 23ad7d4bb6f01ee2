//! Upload and conversion integration tests.
//!
//! Tests verify:
//! - OBJ and STL uploads convert to glTF served under /models
//! - Group names survive conversion as node names
//! - DWG is recognized but not implemented, other extensions are rejected
//! - Missing file field, conversion failures and the body size limit

use axum::body::Body;
use axum::http::{header, Request, StatusCode};

use model_viewer::format::Document;
use model_viewer::server::RouterConfig;
use model_viewer::viewer::SceneGraph;

use super::test_utils::{single_triangle_stl, two_part_obj, valve_quad_obj, TestApp};

/// GET a converted model and parse it.
async fn fetch_model(app: &TestApp, url: &str) -> Document {
    let request = Request::builder().uri(url).body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK, "GET {}", url);
    serde_json::from_slice(&body).unwrap()
}

fn node_names(document: &Document) -> Vec<String> {
    document
        .nodes
        .iter()
        .filter_map(|n| n.name.clone())
        .collect()
}

// =============================================================================
// Successful Conversion
// =============================================================================

#[tokio::test]
async fn test_upload_obj_returns_model_url() {
    let app = TestApp::new().await;

    let (status, json) = app.upload("model", "plant.obj", &valve_quad_obj()).await;
    assert_eq!(status, StatusCode::OK);

    let url = json["url"].as_str().unwrap();
    assert!(url.starts_with("/models/"), "{}", url);
    assert!(url.ends_with(".gltf"), "{}", url);

    let document = fetch_model(&app, url).await;
    assert_eq!(document.asset.version, "2.0");
    assert_eq!(document.meshes.len(), 1);
    assert_eq!(node_names(&document), vec!["valve-1"]);
}

#[tokio::test]
async fn test_converted_model_is_pickable() {
    let app = TestApp::new().await;
    let (_, json) = app.upload("model", "parts.obj", &two_part_obj()).await;
    let document = fetch_model(&app, json["url"].as_str().unwrap()).await;

    let scene = SceneGraph::from_gltf(&document).unwrap();
    assert_eq!(scene.triangle_count(), 2);
    assert_eq!(scene.find_by_name("valve-1").count(), 1);
    assert_eq!(scene.find_by_name("pump-1").count(), 1);
}

#[tokio::test]
async fn test_upload_stl_uses_file_stem_as_node_name() {
    let app = TestApp::new().await;

    let (status, json) = app
        .upload("model", "valve-9.STL", &single_triangle_stl())
        .await;
    assert_eq!(status, StatusCode::OK);

    let document = fetch_model(&app, json["url"].as_str().unwrap()).await;
    assert_eq!(node_names(&document), vec!["valve-9"]);
}

#[tokio::test]
async fn test_raw_upload_and_model_written_to_disk() {
    let app = TestApp::new().await;
    let (_, json) = app.upload("model", "plant.obj", &valve_quad_obj()).await;
    let url = json["url"].as_str().unwrap();
    let stem = url
        .trim_start_matches("/models/")
        .trim_end_matches(".gltf");

    let raw = app.dir.path().join("uploads").join(format!("{}.obj", stem));
    let model = app.dir.path().join("models").join(format!("{}.gltf", stem));
    assert_eq!(std::fs::read(raw).unwrap(), valve_quad_obj());
    assert!(model.exists());
}

#[tokio::test]
async fn test_extra_fields_are_ignored() {
    let app = TestApp::new().await;

    let boundary = "extra-field-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nnew plant\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"model\"; filename=\"p.obj\"\r\n\r\n",
            b = boundary
        )
        .as_bytes(),
    );
    body.extend_from_slice(&valve_quad_obj());
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, app.bearer())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_dwg_is_not_implemented() {
    let app = TestApp::new().await;

    let (status, json) = app.upload("model", "site.dwg", b"AC1032").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json["error"], "not_implemented");
    assert_eq!(json["message"], "DWG conversion not implemented");
}

#[tokio::test]
async fn test_unknown_extension_is_rejected() {
    let app = TestApp::new().await;

    let (status, json) = app.upload("model", "plant.fbx", b"Kaydara FBX").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_format");
}

#[tokio::test]
async fn test_missing_model_field() {
    let app = TestApp::new().await;

    let (status, json) = app.upload("file", "plant.obj", &valve_quad_obj()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "missing_field");
}

#[tokio::test]
async fn test_unparseable_model_is_conversion_failure() {
    let app = TestApp::new().await;

    let (status, json) = app
        .upload("model", "broken.obj", b"v 0 0 0\nf 1 2 3\n")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "conversion_failed");
    assert_eq!(json["message"], "Conversion failed");
}

#[tokio::test]
async fn test_non_finite_vertex_is_conversion_failure() {
    let app = TestApp::new().await;

    let (status, json) = app
        .upload("model", "p.obj", b"o p\nv inf 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "conversion_failed");
}

#[tokio::test]
async fn test_upload_over_body_limit_is_rejected() {
    let app = TestApp::with_router_config(
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(64),
    )
    .await;

    let (status, json) = app.upload("model", "plant.obj", &valve_quad_obj()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"], "payload_too_large");

    let models = std::fs::read_dir(app.dir.path().join("models")).unwrap();
    assert_eq!(models.count(), 0);
}

#[tokio::test]
async fn test_missing_model_file_is_not_found() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/models/0.gltf")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
