//! Metadata, search and annotation integration tests.

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::test_utils::{MockRepository, TestApp};

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_metadata_returns_every_column() {
    let app = TestApp::new().await;

    let (status, json) = app.get_json("/api/metadata/valve-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "valve-1");
    assert_eq!(json["type"], "valve");
    assert_eq!(json["pressure"], 20.0);
    assert_eq!(json["manufacturer"], "Acme");
}

#[tokio::test]
async fn test_metadata_unknown_id_is_empty_object() {
    let app = TestApp::new().await;

    let (status, json) = app.get_json("/api/metadata/no-such-part").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({}));
}

#[tokio::test]
async fn test_metadata_id_is_percent_decoded() {
    let app = TestApp::new().await;
    let (status, json) = app.get_json("/api/metadata/valve%2D1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], "valve-1");
}

#[tokio::test]
async fn test_metadata_database_failure() {
    let app = TestApp::with_repository(MockRepository::failing()).await;
    let (status, json) = app.get_json("/api/metadata/valve-1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "database_error");
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_filters_by_type_and_strict_pressure() {
    let app = TestApp::new().await;

    let (status, json) = app.get_json("/api/search?type=valve&pressureMin=10").await;
    assert_eq!(status, StatusCode::OK);
    // valve-2 sits exactly at the threshold and is excluded
    assert_eq!(json, json!(["valve-1"]));

    let (_, json) = app.get_json("/api/search?type=valve&pressureMin=0").await;
    assert_eq!(json, json!(["valve-1", "valve-2", "valve-3"]));

    let (_, json) = app.get_json("/api/search?type=pump&pressureMin=10").await;
    assert_eq!(json, json!(["pump-1"]));
}

#[tokio::test]
async fn test_search_no_matches() {
    let app = TestApp::new().await;
    let (status, json) = app
        .get_json("/api/search?type=compressor&pressureMin=0")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_search_missing_parameter_is_empty() {
    let app = TestApp::new().await;

    for uri in [
        "/api/search",
        "/api/search?type=valve",
        "/api/search?pressureMin=1",
    ] {
        let (status, json) = app.get_json(uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(json, json!([]), "{}", uri);
    }
}

#[tokio::test]
async fn test_search_non_numeric_pressure_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .get_json("/api/search?type=valve&pressureMin=high")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Annotations
// =============================================================================

#[tokio::test]
async fn test_annotations_start_empty() {
    let app = TestApp::new().await;
    let (status, json) = app.get_json("/api/annotations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_create_annotation_returns_row_with_id() {
    let app = TestApp::new().await;

    let (status, json) = app
        .post_json(
            "/api/annotations",
            &json!({ "x": 1.5, "y": 0.0, "z": -2.25, "note": "check flange" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["id"].as_i64().is_some());
    assert_eq!(json["x"], 1.5);
    assert_eq!(json["z"], -2.25);
    assert_eq!(json["note"], "check flange");

    let (_, list) = app.get_json("/api/annotations").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0], json);
}

#[tokio::test]
async fn test_identical_annotations_are_distinct_rows() {
    let app = TestApp::new().await;
    let body = json!({ "x": 0.0, "y": 0.0, "z": 0.0, "note": "leak" });

    let (_, first) = app.post_json("/api/annotations", &body).await;
    let (_, second) = app.post_json("/api/annotations", &body).await;
    assert_ne!(first["id"], second["id"]);

    let (_, list) = app.get_json("/api/annotations").await;
    let rows: &Vec<Value> = list.as_array().unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_create_annotation_requires_all_fields() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post_json("/api/annotations", &json!({ "x": 0.0, "note": "partial" }))
        .await;
    assert!(status.is_client_error(), "{}", status);
}
