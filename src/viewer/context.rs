//! Render context: everything the viewer's event handlers read and mutate.
//!
//! The context owns one loaded model at a time, the annotation markers, the
//! highlight set and the current selection. Handlers receive it explicitly.

use std::collections::BTreeSet;

use cgmath::Point3;
use tracing::debug;

use crate::db::{Annotation, Component};

use super::camera::{Camera, Pointer};
use super::ray::Plane;
use super::scene::SceneGraph;

/// Lifecycle of an annotation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// Placed locally, not yet acknowledged by the server
    Pending,

    /// Stored on the server under this id
    Confirmed { id: i32 },
}

/// An annotation marker in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Local handle, stable while the marker exists
    pub handle: u64,
    pub position: Point3<f64>,
    pub note: String,
    pub state: MarkerState,
}

/// Token returned when a selection starts; only the latest one may complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    seq: u64,
    component_id: String,
}

impl SelectionTicket {
    pub fn component_id(&self) -> &str {
        &self.component_id
    }
}

/// The selected component and its metadata, once it arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub component_id: String,
    pub metadata: Option<Component>,
}

/// Mutable viewer state.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub camera: Camera,
    model: Option<LoadedModel>,
    markers: Vec<Marker>,
    next_handle: u64,
    highlighted: BTreeSet<usize>,
    selection_seq: u64,
    selection: Option<Selection>,
}

#[derive(Debug, Clone)]
struct LoadedModel {
    url: String,
    scene: SceneGraph,
}

impl RenderContext {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // Model
    // -------------------------------------------------------------------------

    /// Replace the current model wholesale.
    ///
    /// Highlights and the selection refer to the old model and are dropped;
    /// annotation markers are world-space and stay.
    pub fn load_model(&mut self, url: impl Into<String>, scene: SceneGraph) {
        let url = url.into();
        debug!(url = %url, nodes = scene.nodes().len(), "Model loaded into context");
        self.model = Some(LoadedModel { url, scene });
        self.highlighted.clear();
        self.selection = None;
        self.selection_seq += 1;
    }

    pub fn model_url(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.url.as_str())
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.model.as_ref().map(|m| &m.scene)
    }

    // -------------------------------------------------------------------------
    // Picking and selection
    // -------------------------------------------------------------------------

    /// Component id of the nearest model node under the pointer.
    pub fn pick(&self, pointer: &Pointer) -> Option<String> {
        let ray = self.camera.ray(pointer)?;
        self.scene()?.pick(&ray)
    }

    /// Start selecting a component; supersedes any selection in flight.
    pub fn begin_selection(&mut self, component_id: impl Into<String>) -> SelectionTicket {
        self.selection_seq += 1;
        let component_id = component_id.into();
        self.selection = Some(Selection {
            component_id: component_id.clone(),
            metadata: None,
        });
        SelectionTicket {
            seq: self.selection_seq,
            component_id,
        }
    }

    /// Attach metadata to the selection the ticket was issued for.
    ///
    /// Returns `false` and leaves the context untouched when a newer
    /// selection (or a model reload) happened in the meantime.
    pub fn complete_selection(&mut self, ticket: &SelectionTicket, metadata: Component) -> bool {
        if ticket.seq != self.selection_seq {
            debug!(id = %ticket.component_id, "Dropping stale metadata response");
            return false;
        }
        self.selection = Some(Selection {
            component_id: ticket.component_id.clone(),
            metadata: Some(metadata),
        });
        true
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    // -------------------------------------------------------------------------
    // Annotations
    // -------------------------------------------------------------------------

    /// Point on the ground plane `y = 0` under the pointer.
    ///
    /// Independent of the model; `None` when the ray never meets the plane.
    pub fn ground_point(&self, pointer: &Pointer) -> Option<Point3<f32>> {
        self.camera.ray(pointer)?.intersect_plane(&Plane::ground())
    }

    /// Drop a pending marker on the ground under the pointer.
    ///
    /// Returns the marker handle and its position, or `None` when the
    /// pointer is above the horizon.
    pub fn place_annotation(
        &mut self,
        pointer: &Pointer,
        note: impl Into<String>,
    ) -> Option<(u64, Point3<f64>)> {
        let point = self.ground_point(pointer)?;
        let position = Point3::new(point.x as f64, point.y as f64, point.z as f64);
        Some((self.place_marker(position, note), position))
    }

    /// Add a pending marker and return its handle.
    pub fn place_marker(&mut self, position: Point3<f64>, note: impl Into<String>) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.markers.push(Marker {
            handle,
            position,
            note: note.into(),
            state: MarkerState::Pending,
        });
        handle
    }

    /// Mark a pending marker as stored, adopting the server's row.
    pub fn confirm_marker(&mut self, handle: u64, row: &Annotation) -> bool {
        let Some(marker) = self.markers.iter_mut().find(|m| m.handle == handle) else {
            return false;
        };
        marker.position = Point3::new(row.x, row.y, row.z);
        marker.note = row.note.clone();
        marker.state = MarkerState::Confirmed { id: row.id };
        true
    }

    /// Remove a marker whose save failed.
    pub fn discard_marker(&mut self, handle: u64) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| m.handle != handle);
        self.markers.len() != before
    }

    /// Replace confirmed markers with the server's rows; pending ones stay.
    pub fn sync_annotations(&mut self, rows: &[Annotation]) {
        self.markers
            .retain(|m| matches!(m.state, MarkerState::Pending));
        for row in rows {
            let handle = self.next_handle;
            self.next_handle += 1;
            self.markers.push(Marker {
                handle,
                position: Point3::new(row.x, row.y, row.z),
                note: row.note.clone(),
                state: MarkerState::Confirmed { id: row.id },
            });
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    // -------------------------------------------------------------------------
    // Highlights
    // -------------------------------------------------------------------------

    /// Highlight every node named in `ids`; earlier highlights are kept.
    ///
    /// Returns the number of newly highlighted nodes.
    pub fn apply_highlight(&mut self, ids: &[String]) -> usize {
        let Some(model) = self.model.as_ref() else {
            return 0;
        };
        let mut added = 0;
        for id in ids {
            for index in model.scene.find_by_name(id) {
                if self.highlighted.insert(index) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn clear_highlights(&mut self) {
        self.highlighted.clear();
    }

    pub fn is_highlighted(&self, name: &str) -> bool {
        self.scene().is_some_and(|scene| {
            scene
                .find_by_name(name)
                .any(|index| self.highlighted.contains(&index))
        })
    }

    /// Names of highlighted nodes, in node order.
    pub fn highlighted_names(&self) -> Vec<&str> {
        let Some(scene) = self.scene() else {
            return Vec::new();
        };
        self.highlighted
            .iter()
            .filter_map(|&i| scene.node(i).and_then(|n| n.name.as_deref()))
            .collect()
    }
}
