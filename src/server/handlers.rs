//! HTTP request handlers for the model viewer API.
//!
//! # Endpoints
//!
//! - `POST /api/login` - Exchange credentials for a session token
//! - `POST /api/upload` - Upload an OBJ/STL model and convert it to glTF
//! - `GET /api/metadata/{id}` - Component row for a clicked object
//! - `GET /api/search` - Ids of components matching a type and minimum pressure
//! - `GET /api/annotations` - All annotations
//! - `POST /api/annotations` - Create an annotation
//! - `GET /health` - Health check endpoint
//! - `GET /` - Browser viewer page

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::db::{Annotation, NewAnnotation, Repository};
use crate::error::{ConvertError, FormatError, RepositoryError, StoreError};
use crate::format::{convert_file, detect_format};
use crate::store::ModelStore;

use super::auth::{verify_password, AuthError, AuthUser, TokenAuth};

/// Multipart field carrying the uploaded model.
pub const UPLOAD_FIELD: &str = "model";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: Repository> {
    /// Users, components and annotations
    pub repo: Arc<R>,

    /// Raw uploads and converted models
    pub store: Arc<ModelStore>,

    /// Token issuing and verification
    pub auth: TokenAuth,
}

impl<R: Repository> AppState<R> {
    pub fn new(repo: R, store: ModelStore, auth: TokenAuth) -> Self {
        Self {
            repo: Arc::new(repo),
            store: Arc::new(store),
            auth,
        }
    }
}

impl<R: Repository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            store: Arc::clone(&self.store),
            auth: self.auth.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Query parameters for the search endpoint.
///
/// Both are optional on the wire; a missing one matches nothing.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Component type to match exactly
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Exclusive lower bound on pressure
    #[serde(rename = "pressureMin")]
    pub pressure_min: Option<f64>,
}

/// Query parameters for the viewer page.
#[derive(Debug, Default, Deserialize)]
pub struct ViewerQueryParams {
    /// Model URL to load once logged in (e.g. `/models/1735689600000.gltf`)
    pub model: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_credentials", "unsupported_format")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Response from the login endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Response from the upload endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Public URL of the converted glTF file
    pub url: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors surfaced by the API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Login or token failure
    Auth(AuthError),

    /// Database failure
    Repository(RepositoryError),

    /// Filesystem failure while storing an upload or model
    Store(StoreError),

    /// Upload extension is unknown or has no converter
    Format(FormatError),

    /// Converter rejected the file
    Conversion(ConvertError),

    /// Required multipart field is absent
    MissingField(&'static str),

    /// Multipart body could not be read
    Multipart(String),

    /// Upload body exceeds the configured limit
    PayloadTooLarge(String),

    /// Background task failed
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Repository(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<FormatError> for ApiError {
    fn from(err: FormatError) -> Self {
        ApiError::Format(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::Multipart(err.body_text())
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        ApiError::Conversion(err)
    }
}

/// Convert ApiError to HTTP response.
///
/// Errors are logged based on their severity:
/// - 4xx errors are logged at WARN level (client errors)
/// - 5xx errors are logged at ERROR level (server errors)
///
/// Conversion and database failures return a generic message; the cause is
/// only logged.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, detail) = match self {
            ApiError::Auth(err) => return err.into_response(),

            ApiError::Repository(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_error",
                "Database error".to_string(),
                err.to_string(),
            ),

            ApiError::Store(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to store model".to_string(),
                err.to_string(),
            ),

            ApiError::Format(err) => {
                let status = match err {
                    FormatError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
                    FormatError::Unsupported { .. } => StatusCode::BAD_REQUEST,
                };
                let error_type = match err {
                    FormatError::NotImplemented { .. } => "not_implemented",
                    FormatError::Unsupported { .. } => "unsupported_format",
                };
                (status, error_type, err.to_string(), err.to_string())
            }

            ApiError::Conversion(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "conversion_failed",
                "Conversion failed".to_string(),
                err.to_string(),
            ),

            ApiError::MissingField(field) => {
                let message = format!("Missing multipart field '{}'", field);
                (
                    StatusCode::BAD_REQUEST,
                    "missing_field",
                    message.clone(),
                    message,
                )
            }

            ApiError::Multipart(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_upload",
                format!("Invalid upload: {}", msg),
                msg,
            ),

            ApiError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Upload exceeds the size limit".to_string(),
                msg,
            ),

            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
                msg,
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                detail
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                detail
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle login requests.
///
/// # Endpoint
///
/// `POST /api/login`
///
/// # Request
///
/// ```json
/// { "username": "alice", "password": "secret" }
/// ```
///
/// # Response
///
/// - `200 OK`: `{ "token": "<jwt>" }`
/// - `401 Unauthorized`: Unknown user or wrong password (indistinguishable)
pub async fn login_handler<R: Repository>(
    State(state): State<AppState<R>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(user) = state.repo.find_user_by_username(&body.username).await? else {
        debug!(username = %body.username, "Login for unknown user");
        return Err(AuthError::InvalidCredentials.into());
    };

    if !verify_password(body.password, user.password_hash.clone()).await? {
        debug!(username = %user.username, "Login with wrong password");
        return Err(AuthError::InvalidCredentials.into());
    }

    let (token, exp) = state.auth.issue(user.id, &user.username)?;
    info!(user_id = user.id, username = %user.username, exp, "User logged in");

    Ok(Json(LoginResponse { token }))
}

/// Handle model uploads.
///
/// # Endpoint
///
/// `POST /api/upload` (multipart, file in field `model`)
///
/// The raw file is stored first, then dispatched by extension to a converter.
/// Conversion runs on the blocking thread pool.
///
/// # Response
///
/// - `200 OK`: `{ "url": "/models/<millis>.gltf" }`
/// - `400 Bad Request`: Missing field or unsupported extension
/// - `413 Payload Too Large`: Body exceeds `max_upload_bytes`
/// - `500 Internal Server Error`: Conversion or storage failure
/// - `501 Not Implemented`: DWG upload
pub async fn upload_handler<R: Repository>(
    State(state): State<AppState<R>>,
    AuthUser(claims): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (original_name, data) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(ApiError::from)?
            .ok_or(ApiError::MissingField(UPLOAD_FIELD))?;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(ApiError::from)?;
        break (name, data);
    };

    debug!(
        file = %original_name,
        bytes = data.len(),
        user = %claims.username,
        "Received upload"
    );

    let stored = state.store.save_upload(&original_name, &data).await?;
    let format = detect_format(&original_name)?;

    let default_name = FsPath::new(&original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(stored.stem.as_str())
        .to_string();
    let path = stored.path.clone();
    let document =
        tokio::task::spawn_blocking(move || convert_file(format, &path, &default_name))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;

    let url = state.store.write_model(&stored.stem, &document).await?;
    info!(
        file = %original_name,
        format = format.name(),
        nodes = document.nodes.len(),
        url = %url,
        "Converted model"
    );

    Ok(Json(UploadResponse { url }))
}

/// Handle component metadata requests.
///
/// # Endpoint
///
/// `GET /api/metadata/{id}`
///
/// # Response
///
/// `200 OK` with the component's columns, or `{}` when the id is unknown.
pub async fn metadata_handler<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = state.repo.component_by_id(&id).await?;
    if row.is_none() {
        debug!(id = %id, "No metadata for component");
    }
    Ok(Json(serde_json::Value::Object(row.unwrap_or_default())))
}

/// Handle component search requests.
///
/// # Endpoint
///
/// `GET /api/search?type=valve&pressureMin=10`
///
/// # Response
///
/// `200 OK` with a JSON array of component ids where `type` equals the
/// given type and `pressure` is strictly greater than `pressureMin`.
/// A missing parameter yields `[]`; a non-numeric `pressureMin` is a 400.
pub async fn search_handler<R: Repository>(
    State(state): State<AppState<R>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    let (Some(kind), Some(pressure_min)) = (params.kind, params.pressure_min) else {
        return Ok(Json(Vec::new()));
    };

    let ids = state.repo.search_components(&kind, pressure_min).await?;
    debug!(kind = %kind, pressure_min, matches = ids.len(), "Component search");
    Ok(Json(ids))
}

/// Handle annotation list requests.
///
/// # Endpoint
///
/// `GET /api/annotations`
pub async fn list_annotations_handler<R: Repository>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<Annotation>>, ApiError> {
    Ok(Json(state.repo.list_annotations().await?))
}

/// Handle annotation creation.
///
/// # Endpoint
///
/// `POST /api/annotations` with `{ "x": 0.0, "y": 0.0, "z": 1.5, "note": "..." }`
///
/// # Response
///
/// `200 OK` with the stored row, including its assigned `id`.
pub async fn create_annotation_handler<R: Repository>(
    State(state): State<AppState<R>>,
    AuthUser(claims): AuthUser,
    Json(body): Json<NewAnnotation>,
) -> Result<Json<Annotation>, ApiError> {
    let annotation = state.repo.insert_annotation(&body).await?;
    info!(
        id = annotation.id,
        user = %claims.username,
        "Annotation created"
    );
    Ok(Json(annotation))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Serve the browser viewer page.
///
/// # Endpoint
///
/// `GET /` or `GET /?model=/models/<file>.gltf`
pub async fn viewer_handler(Query(query): Query<ViewerQueryParams>) -> Html<String> {
    Html(super::viewer::generate_viewer_html(query.model.as_deref()))
}

// =============================================================================
// Tests
// =============================================================================
