//! HTTP server layer for the model viewer service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │      POST /api/upload   GET /api/metadata/{id}   GET /models/*  │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    auth     │  │        routes           │  │
//! │  │ (requests)  │  │ (JWT bearer)│  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! │                   ┌─────────────┐                               │
//! │                   │   viewer    │  browser page at /            │
//! │                   └─────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod viewer;

pub use auth::{
    auth_middleware, bearer_token, hash_password, verify_password, AuthError, AuthUser, Claims,
    TokenAuth,
};
pub use handlers::{
    create_annotation_handler, health_handler, list_annotations_handler, login_handler,
    metadata_handler, search_handler, upload_handler, viewer_handler, ApiError, AppState,
    ErrorResponse, HealthResponse, LoginRequest, LoginResponse, SearchParams, UploadResponse,
    ViewerQueryParams, UPLOAD_FIELD,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
