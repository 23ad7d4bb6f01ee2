//! Router configuration for the model viewer service.
//!
//! This module defines the HTTP routes and applies middleware for authentication,
//! upload size limits and CORS.
//!
//! # Route Structure
//!
//! ```text
//! /                       - Viewer page (public)
//! /health                 - Health check (public)
//! /models/{file}          - Converted glTF files (public, static)
//! /api/login              - Credentials for a token (public)
//! /api/upload             - Model upload and conversion (protected)
//! /api/metadata/{id}      - Component metadata (protected)
//! /api/search             - Component search (protected)
//! /api/annotations        - List and create annotations (protected)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use model_viewer::server::{create_router, AppState, RouterConfig, TokenAuth};
//!
//! let state = AppState::new(repo, store, TokenAuth::new(secret, ttl));
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::auth::auth_middleware;
use super::handlers::{
    create_annotation_handler, health_handler, list_annotations_handler, login_handler,
    metadata_handler, search_handler, upload_handler, viewer_handler, AppState,
};
use crate::db::Repository;
use crate::store::MODELS_URL_PREFIX;

/// Default maximum request body size for uploads (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum accepted body size on `/api` routes
    pub max_upload_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Uploads are limited to 100 MiB
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the maximum upload body size in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Public routes (viewer page, health check, login, static models)
/// - Protected `/api` routes behind the bearer token middleware
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<R: Repository>(state: AppState<R>, config: RouterConfig) -> Router {
    let cors = build_cors_layer(&config);
    let models = ServeDir::new(state.store.models_dir());

    // route_layer keeps unknown /api paths as 404 instead of 401
    let protected_routes = Router::new()
        .route("/upload", post(upload_handler::<R>))
        .route("/metadata/{id}", get(metadata_handler::<R>))
        .route("/search", get(search_handler::<R>))
        .route(
            "/annotations",
            get(list_annotations_handler::<R>).post(create_annotation_handler::<R>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/login", post(login_handler::<R>))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    let router = Router::new()
        .route("/", get(viewer_handler))
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .nest_service(MODELS_URL_PREFIX, models)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
