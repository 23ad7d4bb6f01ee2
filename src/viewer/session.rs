//! Viewer session: drives the API client and the render context together.

use tracing::{debug, warn};

use crate::db::{Annotation, Component, NewAnnotation};
use crate::error::ClientError;

use super::camera::Pointer;
use super::client::ApiClient;
use super::context::{RenderContext, SelectionTicket};
use super::scene::SceneGraph;

/// Result of clicking on the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub component_id: String,
    pub metadata: Component,
}

/// A logged-in viewer: one API client, one render context.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    client: ApiClient,
    context: RenderContext,
}

impl ViewerSession {
    pub fn new(client: ApiClient, context: RenderContext) -> Self {
        Self { client, context }
    }

    /// Session against a server root with the default camera.
    pub fn connect(base_url: impl Into<String>) -> Self {
        Self::new(ApiClient::new(base_url), RenderContext::default())
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Log in and load the existing annotations.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        self.client.login(username, password).await?;
        self.refresh_annotations().await?;
        Ok(())
    }

    /// Re-read all annotations from the server.
    pub async fn refresh_annotations(&mut self) -> Result<usize, ClientError> {
        let rows = self.client.list_annotations().await?;
        self.context.sync_annotations(&rows);
        Ok(rows.len())
    }

    /// Upload a model file, then fetch and display the converted result.
    pub async fn upload_and_load(
        &mut self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String, ClientError> {
        let url = self.client.upload_model(file_name, data).await?;
        self.load_model(&url).await?;
        Ok(url)
    }

    /// Fetch a converted model and make it the current one.
    pub async fn load_model(&mut self, url: &str) -> Result<(), ClientError> {
        let document = self.client.fetch_model(url).await?;
        let scene = SceneGraph::from_gltf(&document)?;
        self.context.load_model(url, scene);
        Ok(())
    }

    /// Click: identify the component under the pointer and fetch its metadata.
    ///
    /// `Ok(None)` when nothing is hit. Holding `&mut self` across the fetch
    /// means clicks through this method never overlap; callers that issue
    /// metadata requests concurrently use [`begin_click`](Self::begin_click)
    /// and [`finish_click`](Self::finish_click) instead.
    pub async fn click(&mut self, pointer: &Pointer) -> Result<Option<Inspection>, ClientError> {
        let Some(ticket) = self.begin_click(pointer) else {
            return Ok(None);
        };
        let metadata = self.client.metadata(ticket.component_id()).await?;
        Ok(self.finish_click(&ticket, metadata))
    }

    /// Pick the component under the pointer and start selecting it.
    ///
    /// Any selection still waiting for metadata is superseded.
    pub fn begin_click(&mut self, pointer: &Pointer) -> Option<SelectionTicket> {
        let component_id = self.context.pick(pointer)?;
        Some(self.context.begin_selection(component_id))
    }

    /// Deliver metadata for a click; `None` if a newer click superseded it.
    pub fn finish_click(
        &mut self,
        ticket: &SelectionTicket,
        metadata: Component,
    ) -> Option<Inspection> {
        if !self.context.complete_selection(ticket, metadata.clone()) {
            return None;
        }
        Some(Inspection {
            component_id: ticket.component_id().to_string(),
            metadata,
        })
    }

    /// Double-click: annotate the ground point under the pointer.
    ///
    /// The marker is shown as pending while the save is in flight, then
    /// confirmed with the stored row or removed if the save fails.
    /// `Ok(None)` when the pointer is above the horizon.
    pub async fn double_click(
        &mut self,
        pointer: &Pointer,
        note: &str,
    ) -> Result<Option<Annotation>, ClientError> {
        let Some((handle, position)) = self.context.place_annotation(pointer, note) else {
            debug!("Double-click missed the ground plane");
            return Ok(None);
        };

        let new = NewAnnotation {
            x: position.x,
            y: position.y,
            z: position.z,
            note: note.to_string(),
        };

        match self.client.create_annotation(&new).await {
            Ok(row) => {
                self.context.confirm_marker(handle, &row);
                Ok(Some(row))
            }
            Err(e) => {
                warn!("Annotation was not saved: {}", e);
                self.context.discard_marker(handle);
                Err(e)
            }
        }
    }

    /// Search and highlight matching components.
    pub async fn search(
        &mut self,
        kind: &str,
        pressure_min: f64,
    ) -> Result<Vec<String>, ClientError> {
        let ids = self.client.search(kind, pressure_min).await?;
        self.context.apply_highlight(&ids);
        Ok(ids)
    }

    pub fn clear_highlights(&mut self) {
        self.context.clear_highlights();
    }
}
