//! Viewer client core.
//!
//! The browser page served at `/` does the rendering; this module holds the
//! same interaction logic in Rust so it can be driven and tested headlessly:
//!
//! - [`camera`] - perspective camera, pointer to NDC to ray
//! - [`ray`] - triangle and plane intersection
//! - [`scene`] - glTF document to a pickable world-space scene
//! - [`context`] - the render context passed to every event handler
//! - [`client`] - typed HTTP client for the API
//! - [`session`] - login, upload, click, double-click and search flows

pub mod camera;
pub mod client;
pub mod context;
pub mod ray;
pub mod scene;
pub mod session;

pub use camera::{Camera, Pointer};
pub use client::ApiClient;
pub use context::{Marker, MarkerState, RenderContext, Selection, SelectionTicket};
pub use ray::{Plane, Ray};
pub use scene::{Hit, SceneGraph, SceneNode};
pub use session::{Inspection, ViewerSession};
