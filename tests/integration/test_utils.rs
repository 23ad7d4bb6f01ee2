//! Test utilities for integration tests.
//!
//! Provides an in-memory [`Repository`], a router wired to temporary
//! storage directories, multipart body construction and small sample
//! models.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::RwLock;
use tower::ServiceExt;

use model_viewer::db::{Annotation, Component, NewAnnotation, Repository, User};
use model_viewer::error::RepositoryError;
use model_viewer::server::{create_router, hash_password, AppState, RouterConfig, TokenAuth};
use model_viewer::store::ModelStore;

pub const TEST_SECRET: &str = "integration-secret";
pub const TEST_USER: &str = "alice";
pub const TEST_PASSWORD: &str = "correct horse";
pub const TEST_USER_ID: i32 = 1;

const BOUNDARY: &str = "model-viewer-test-boundary";

// =============================================================================
// Mock Repository
// =============================================================================

/// In-memory repository with one user and a handful of components.
pub struct MockRepository {
    users: Vec<User>,
    components: Vec<Component>,
    annotations: RwLock<Vec<Annotation>>,
    fail: bool,
}

impl MockRepository {
    pub fn new() -> Self {
        let password_hash = hash_password(TEST_PASSWORD, 4).unwrap();
        Self {
            users: vec![User {
                id: TEST_USER_ID,
                username: TEST_USER.to_string(),
                password_hash,
            }],
            components: vec![
                component("valve-1", "valve", 20.0),
                component("valve-2", "valve", 10.0),
                component("valve-3", "valve", 5.5),
                component("pump-1", "pump", 50.0),
            ],
            annotations: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    /// A repository whose every query fails, as if the database were down.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn component(id: &str, kind: &str, pressure: f64) -> Component {
    let value = json!({
        "id": id,
        "type": kind,
        "pressure": pressure,
        "manufacturer": "Acme",
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }

    async fn component_by_id(&self, id: &str) -> Result<Option<Component>, RepositoryError> {
        self.check()?;
        Ok(self
            .components
            .iter()
            .find(|c| c.get("id").and_then(Value::as_str) == Some(id))
            .cloned())
    }

    async fn search_components(
        &self,
        kind: &str,
        pressure_min: f64,
    ) -> Result<Vec<String>, RepositoryError> {
        self.check()?;
        Ok(self
            .components
            .iter()
            .filter(|c| c.get("type").and_then(Value::as_str) == Some(kind))
            .filter(|c| {
                c.get("pressure")
                    .and_then(Value::as_f64)
                    .is_some_and(|p| p > pressure_min)
            })
            .filter_map(|c| c.get("id").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    async fn list_annotations(&self) -> Result<Vec<Annotation>, RepositoryError> {
        self.check()?;
        Ok(self.annotations.read().await.clone())
    }

    async fn insert_annotation(
        &self,
        annotation: &NewAnnotation,
    ) -> Result<Annotation, RepositoryError> {
        self.check()?;
        let mut rows = self.annotations.write().await;
        let row = annotation.clone().with_id(rows.len() as i32 + 1);
        rows.push(row.clone());
        Ok(row)
    }
}

// =============================================================================
// Test Application
// =============================================================================

/// Router plus the temporary directories and token issuer behind it.
pub struct TestApp {
    pub router: Router,
    pub auth: TokenAuth,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_repository(MockRepository::new()).await
    }

    pub async fn with_repository(repo: MockRepository) -> Self {
        Self::build(repo, RouterConfig::new().with_tracing(false)).await
    }

    pub async fn with_router_config(config: RouterConfig) -> Self {
        Self::build(MockRepository::new(), config).await
    }

    async fn build(repo: MockRepository, config: RouterConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("uploads"), dir.path().join("models"));
        store.ensure_dirs().await.unwrap();

        let auth = TokenAuth::new(TEST_SECRET, Duration::from_secs(3600));
        let state = AppState::new(repo, store, auth.clone());
        let router = create_router(state, config);

        Self { router, auth, dir }
    }

    /// A valid bearer token for the test user.
    pub fn token(&self) -> String {
        self.auth.issue(TEST_USER_ID, TEST_USER).unwrap().0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token())
    }

    /// Send a request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    /// Authorized GET returning the parsed JSON body.
    pub async fn get_json(&self, uri: &str) -> (axum::http::StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::empty())
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    /// Authorized JSON POST returning the parsed JSON body.
    pub async fn post_json(&self, uri: &str, body: &Value) -> (axum::http::StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, self.bearer())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    /// Authorized multipart upload of one file.
    pub async fn upload(
        &self,
        field: &str,
        file_name: &str,
        data: &[u8],
    ) -> (axum::http::StatusCode, Value) {
        let request = upload_request()
            .header(header::AUTHORIZATION, self.bearer())
            .body(Body::from(multipart_body(field, file_name, data)))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Builder for `POST /api/upload` with the multipart content type set.
pub fn upload_request() -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
}

/// A multipart/form-data body with a single file field.
pub fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

// =============================================================================
// Sample Models
// =============================================================================

/// A 2x2 quad named `valve-1` in the z = 0 plane, centered on the origin.
pub fn valve_quad_obj() -> Vec<u8> {
    "\
o valve-1
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
f 1 2 3 4
"
    .as_bytes()
    .to_vec()
}

/// Two named parts in one OBJ file.
pub fn two_part_obj() -> Vec<u8> {
    "\
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 1
o valve-1
f 1 2 3
o pump-1
f 1 3 4
"
    .as_bytes()
    .to_vec()
}

/// Binary STL with a single triangle.
pub fn single_triangle_stl() -> Vec<u8> {
    let mut data = vec![0u8; 80];
    data.extend_from_slice(&1u32.to_le_bytes());
    let floats: [f32; 12] = [
        0.0, 0.0, 1.0, // normal
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, //
    ];
    for f in floats {
        data.extend_from_slice(&f.to_le_bytes());
    }
    data.extend_from_slice(&0u16.to_le_bytes());
    data
}
