//! glTF 2.0 document model and encoder.
//!
//! Only the subset of the glTF schema that the converters write and the
//! viewer reads is modelled. Converted documents are self-contained: all
//! vertex data lives in a single buffer embedded as a base64 data URI, so
//! the `.gltf` file can be served and loaded on its own.
//!
//! # Layout Written by [`build_document`]
//!
//! ```text
//! scene 0 ── node i (name = group name) ── mesh i ── primitive
//!                                                    ├── POSITION  accessor (FLOAT VEC3, min/max)
//!                                                    ├── NORMAL    accessor (FLOAT VEC3)
//!                                                    └── indices   accessor (UNSIGNED_INT SCALAR)
//! buffer 0: [positions_0 | normals_0 | indices_0 | positions_1 | ...]
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

use super::mesh::MeshGroup;

// =============================================================================
// Constants
// =============================================================================

/// `componentType` for 8-bit unsigned integers.
pub const UNSIGNED_BYTE: u32 = 5121;

/// `componentType` for 16-bit unsigned integers.
pub const UNSIGNED_SHORT: u32 = 5123;

/// `componentType` for 32-bit unsigned integers.
pub const UNSIGNED_INT: u32 = 5125;

/// `componentType` for 32-bit floats.
pub const FLOAT: u32 = 5126;

/// Buffer view target for vertex attributes.
pub const ARRAY_BUFFER: u32 = 34962;

/// Buffer view target for index data.
pub const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Primitive mode for triangle lists (the glTF default).
pub const MODE_TRIANGLES: u32 = 4;

/// Prefix of embedded buffer URIs written by the encoder.
pub const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";

/// Value of `asset.generator` in converted documents.
pub const GENERATOR: &str = concat!("model-viewer ", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Document Model
// =============================================================================

/// Root glTF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: Some(GENERATOR.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    /// Unit quaternion `[x, y, z, w]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    /// Column-major 4x4 matrix; overrides TRS when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f32; 16]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Mesh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub double_sided: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

// =============================================================================
// Encoding
// =============================================================================

/// Build a self-contained glTF document from mesh groups.
pub fn build_document(groups: &[MeshGroup]) -> Document {
    let mut doc = Document {
        scene: Some(0),
        materials: vec![default_material()],
        ..Document::default()
    };
    let mut blob: Vec<u8> = Vec::new();
    let mut roots = Vec::with_capacity(groups.len());

    for group in groups {
        let position = push_vec3_accessor(&mut doc, &mut blob, &group.positions, true);
        let normal = push_vec3_accessor(&mut doc, &mut blob, &group.normals, false);
        let indices = push_index_accessor(&mut doc, &mut blob, &group.indices);

        let mut attributes = BTreeMap::new();
        attributes.insert("POSITION".to_string(), position);
        attributes.insert("NORMAL".to_string(), normal);

        let mesh_index = doc.meshes.len();
        doc.meshes.push(Mesh {
            name: Some(group.name.clone()),
            primitives: vec![Primitive {
                attributes,
                indices: Some(indices),
                material: Some(0),
                mode: Some(MODE_TRIANGLES),
            }],
        });

        roots.push(doc.nodes.len());
        doc.nodes.push(Node {
            name: Some(group.name.clone()),
            mesh: Some(mesh_index),
            ..Node::default()
        });
    }

    doc.scenes.push(Scene {
        name: None,
        nodes: roots,
    });
    doc.buffers.push(Buffer {
        byte_length: blob.len(),
        uri: Some(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(&blob))),
    });
    doc
}

fn default_material() -> Material {
    Material {
        name: Some("default".to_string()),
        pbr_metallic_roughness: Some(PbrMetallicRoughness {
            base_color_factor: [0.8, 0.8, 0.8, 1.0],
            metallic_factor: 0.0,
            roughness_factor: 1.0,
        }),
        double_sided: true,
    }
}

fn push_vec3_accessor(
    doc: &mut Document,
    blob: &mut Vec<u8>,
    values: &[[f32; 3]],
    with_bounds: bool,
) -> usize {
    let offset = blob.len();
    for v in values {
        for c in v {
            blob.extend_from_slice(&c.to_le_bytes());
        }
    }

    let (min, max) = if with_bounds {
        let bounds = vec3_bounds(values);
        (
            bounds.map(|(min, _)| min.to_vec()),
            bounds.map(|(_, max)| max.to_vec()),
        )
    } else {
        (None, None)
    };

    let view = doc.buffer_views.len();
    doc.buffer_views.push(BufferView {
        buffer: 0,
        byte_offset: offset,
        byte_length: blob.len() - offset,
        byte_stride: None,
        target: Some(ARRAY_BUFFER),
    });

    let accessor = doc.accessors.len();
    doc.accessors.push(Accessor {
        buffer_view: Some(view),
        byte_offset: 0,
        component_type: FLOAT,
        count: values.len(),
        kind: "VEC3".to_string(),
        min,
        max,
    });
    accessor
}

fn push_index_accessor(doc: &mut Document, blob: &mut Vec<u8>, indices: &[u32]) -> usize {
    let offset = blob.len();
    for i in indices {
        blob.extend_from_slice(&i.to_le_bytes());
    }

    let view = doc.buffer_views.len();
    doc.buffer_views.push(BufferView {
        buffer: 0,
        byte_offset: offset,
        byte_length: blob.len() - offset,
        byte_stride: None,
        target: Some(ELEMENT_ARRAY_BUFFER),
    });

    let accessor = doc.accessors.len();
    doc.accessors.push(Accessor {
        buffer_view: Some(view),
        byte_offset: 0,
        component_type: UNSIGNED_INT,
        count: indices.len(),
        kind: "SCALAR".to_string(),
        min: None,
        max: None,
    });
    accessor
}

fn vec3_bounds(values: &[[f32; 3]]) -> Option<([f32; 3], [f32; 3])> {
    let first = *values.first()?;
    Some(values.iter().fold((first, first), |(mut min, mut max), v| {
        for axis in 0..3 {
            min[axis] = min[axis].min(v[axis]);
            max[axis] = max[axis].max(v[axis]);
        }
        (min, max)
    }))
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the bytes of a buffer embedded as a base64 data URI.
///
/// Any `data:<mime>;base64,` prefix is accepted; external file URIs are not.
pub fn decode_buffer(index: usize, buffer: &Buffer) -> Result<Vec<u8>, LoadError> {
    let uri = buffer.uri.as_deref().ok_or(LoadError::MissingUri(index))?;
    let payload = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| LoadError::UnsupportedUri(truncate_uri(uri)))?;

    STANDARD
        .decode(payload)
        .map_err(|e| LoadError::InvalidDataUri(e.to_string()))
}

fn truncate_uri(uri: &str) -> String {
    uri.chars().take(64).collect()
}

// =============================================================================
// Tests
// =============================================================================
