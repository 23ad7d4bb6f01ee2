//! # Model Viewer
//!
//! A small service for publishing 3D plant models and annotating them.
//!
//! Authenticated users upload Wavefront OBJ or STL files, which are converted
//! to glTF 2.0 and served as static files. Clicking a part of the model looks
//! up the component record with the same name, double-clicking the ground
//! plane stores a point annotation, and a search highlights every component
//! of a given type above a pressure threshold.
//!
//! ## Architecture
//!
//! - [`mod@format`] - format detection and the OBJ/STL to glTF converters
//! - [`store`] - upload and converted-model files on disk
//! - [`db`] - user, component and annotation persistence (Postgres)
//! - [`server`] - Axum HTTP API, bearer token auth and the browser viewer page
//! - [`viewer`] - viewer-side scene graph, picking and an API client
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use model_viewer::{create_router, AppState, ModelStore, PgRepository, RouterConfig, TokenAuth};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repo = PgRepository::connect("postgres://localhost/universalpv", 10).await?;
//!     let store = ModelStore::new("uploads", "public/models");
//!     store.ensure_dirs().await?;
//!
//!     let auth = TokenAuth::new("change-me", Duration::from_secs(3600));
//!     let state = AppState::new(repo, store, auth);
//!     let router = create_router(state, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:4000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod server;
pub mod store;
pub mod viewer;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, HashPasswordConfig, ServeConfig, TokenConfig};
pub use db::{Annotation, Component, NewAnnotation, PgRepository, Repository, User};
pub use error::{ClientError, ConvertError, FormatError, LoadError, RepositoryError, StoreError};
pub use format::{convert_bytes, convert_file, detect_format, Document, ModelFormat};
pub use server::{
    create_router, AppState, AuthError, Claims, RouterConfig, TokenAuth,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use store::ModelStore;
pub use viewer::{ApiClient, Camera, Pointer, RenderContext, SceneGraph, ViewerSession};
