//! Pickable scene graph built from a glTF document.
//!
//! Triangles are flattened into world space when the model is loaded, so a
//! raycast is a linear scan with no per-query transforms.

use std::collections::HashSet;

use cgmath::{Matrix4, Point3, Quaternion, Transform, Vector3};
use tracing::debug;

use crate::error::LoadError;
use crate::format::gltf::{
    decode_buffer, Accessor, Document, Node, FLOAT, MODE_TRIANGLES, UNSIGNED_BYTE, UNSIGNED_INT,
    UNSIGNED_SHORT,
};

use super::ray::Ray;

/// A node of the loaded model with its geometry in world space.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub world: Matrix4<f32>,
    pub triangles: Vec<[Point3<f32>; 3]>,
}

/// The nearest intersection of a ray with the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Index of the node that owns the hit triangle
    pub node: usize,

    /// Distance along the ray
    pub distance: f32,

    pub point: Point3<f32>,
}

/// All nodes reachable from the document's scene.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    /// Build the scene from a document whose buffers are embedded data URIs.
    pub fn from_gltf(doc: &Document) -> Result<Self, LoadError> {
        let scene_index = doc.scene.unwrap_or(0);
        let scene = doc.scenes.get(scene_index).ok_or(LoadError::NoScene)?;

        let buffers = doc
            .buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| decode_buffer(i, buffer))
            .collect::<Result<Vec<_>, _>>()?;

        let mut graph = SceneGraph::default();
        let mut visited = HashSet::new();
        let mut stack: Vec<(usize, Option<usize>, Matrix4<f32>)> = scene
            .nodes
            .iter()
            .rev()
            .map(|&index| (index, None, Matrix4::from_scale(1.0)))
            .collect();

        while let Some((index, parent, parent_world)) = stack.pop() {
            // Node graphs must be trees; skip repeats instead of looping forever
            if !visited.insert(index) {
                continue;
            }
            let node = doc.nodes.get(index).ok_or(LoadError::MissingReference {
                kind: "node",
                index,
            })?;

            let world = parent_world * local_transform(node);
            let triangles = match node.mesh {
                Some(mesh) => mesh_triangles(doc, &buffers, mesh, &world)?,
                None => Vec::new(),
            };

            let graph_index = graph.nodes.len();
            graph.nodes.push(SceneNode {
                name: node.name.clone(),
                parent,
                world,
                triangles,
            });

            for &child in node.children.iter().rev() {
                stack.push((child, Some(graph_index), world));
            }
        }

        debug!(
            nodes = graph.nodes.len(),
            triangles = graph.triangle_count(),
            "Loaded scene"
        );
        Ok(graph)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&SceneNode> {
        self.nodes.get(index)
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(|n| n.triangles.len()).sum()
    }

    /// Indices of nodes with the given name.
    pub fn find_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.name.as_deref() == Some(name))
            .map(|(i, _)| i)
    }

    /// Nearest triangle hit along the ray.
    pub fn raycast(&self, ray: &Ray) -> Option<Hit> {
        let mut nearest: Option<Hit> = None;
        for (index, node) in self.nodes.iter().enumerate() {
            for [a, b, c] in &node.triangles {
                let Some(distance) = ray.intersect_triangle(*a, *b, *c) else {
                    continue;
                };
                if nearest.as_ref().map_or(true, |hit| distance < hit.distance) {
                    nearest = Some(Hit {
                        node: index,
                        distance,
                        point: ray.at(distance),
                    });
                }
            }
        }
        nearest
    }

    /// Name identifying the hit node: its own, or its nearest named ancestor.
    pub fn identify(&self, hit: &Hit) -> Option<&str> {
        let mut current = Some(hit.node);
        while let Some(index) = current {
            let node = self.nodes.get(index)?;
            if let Some(name) = node.name.as_deref().filter(|n| !n.is_empty()) {
                return Some(name);
            }
            current = node.parent;
        }
        None
    }

    /// Component id under the ray, if any.
    pub fn pick(&self, ray: &Ray) -> Option<String> {
        let hit = self.raycast(ray)?;
        self.identify(&hit).map(str::to_string)
    }
}

fn local_transform(node: &Node) -> Matrix4<f32> {
    if let Some(m) = node.matrix {
        return Matrix4::new(
            m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12],
            m[13], m[14], m[15],
        );
    }

    let [tx, ty, tz] = node.translation.unwrap_or([0.0; 3]);
    let [qx, qy, qz, qw] = node.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]);
    let [sx, sy, sz] = node.scale.unwrap_or([1.0; 3]);

    Matrix4::from_translation(Vector3::new(tx, ty, tz))
        * Matrix4::from(Quaternion::new(qw, qx, qy, qz))
        * Matrix4::from_nonuniform_scale(sx, sy, sz)
}

fn mesh_triangles(
    doc: &Document,
    buffers: &[Vec<u8>],
    mesh_index: usize,
    world: &Matrix4<f32>,
) -> Result<Vec<[Point3<f32>; 3]>, LoadError> {
    let mesh = doc.meshes.get(mesh_index).ok_or(LoadError::MissingReference {
        kind: "mesh",
        index: mesh_index,
    })?;

    let mut triangles = Vec::new();
    for primitive in &mesh.primitives {
        if primitive.mode.unwrap_or(MODE_TRIANGLES) != MODE_TRIANGLES {
            debug!(mesh = mesh_index, "Skipping non-triangle primitive");
            continue;
        }
        let Some(&position_index) = primitive.attributes.get("POSITION") else {
            continue;
        };

        let positions: Vec<Point3<f32>> = read_positions(doc, buffers, position_index)?
            .into_iter()
            .map(|p| world.transform_point(Point3::new(p[0], p[1], p[2])))
            .collect();

        let indices = match primitive.indices {
            Some(index) => read_indices(doc, buffers, index)?,
            None => (0..positions.len() as u32).collect(),
        };

        for tri in indices.chunks_exact(3) {
            let corner = |i: u32| {
                positions
                    .get(i as usize)
                    .copied()
                    .ok_or(LoadError::OutOfBounds {
                        index: position_index,
                    })
            };
            triangles.push([corner(tri[0])?, corner(tri[1])?, corner(tri[2])?]);
        }
    }
    Ok(triangles)
}

fn accessor<'d>(doc: &'d Document, index: usize) -> Result<&'d Accessor, LoadError> {
    doc.accessors.get(index).ok_or(LoadError::MissingReference {
        kind: "accessor",
        index,
    })
}

/// Byte slices of each element of an accessor.
fn accessor_elements<'b>(
    doc: &Document,
    buffers: &'b [Vec<u8>],
    index: usize,
    accessor: &Accessor,
    element_size: usize,
) -> Result<Vec<&'b [u8]>, LoadError> {
    let view_index = accessor.buffer_view.ok_or(LoadError::UnsupportedAccessor {
        index,
        reason: "sparse or empty accessors are not supported".to_string(),
    })?;
    let view = doc
        .buffer_views
        .get(view_index)
        .ok_or(LoadError::MissingReference {
            kind: "buffer view",
            index: view_index,
        })?;
    let buffer = buffers.get(view.buffer).ok_or(LoadError::MissingReference {
        kind: "buffer",
        index: view.buffer,
    })?;

    let stride = view.byte_stride.unwrap_or(element_size);
    let view_end = view
        .byte_offset
        .checked_add(view.byte_length)
        .filter(|&end| end <= buffer.len())
        .ok_or(LoadError::OutOfBounds { index })?;
    let view_bytes = &buffer[view.byte_offset..view_end];

    if stride < element_size {
        return Err(LoadError::UnsupportedAccessor {
            index,
            reason: format!("byte stride {} is below element size {}", stride, element_size),
        });
    }

    // The last element bounds every other one, so check it before reading
    if let Some(last) = accessor.count.checked_sub(1) {
        element_range(accessor.byte_offset, last, stride, element_size)
            .filter(|range| range.end <= view_bytes.len())
            .ok_or(LoadError::OutOfBounds { index })?;
    }

    (0..accessor.count)
        .map(|i| {
            element_range(accessor.byte_offset, i, stride, element_size)
                .and_then(|range| view_bytes.get(range))
                .ok_or(LoadError::OutOfBounds { index })
        })
        .collect()
}

fn element_range(
    offset: usize,
    i: usize,
    stride: usize,
    element_size: usize,
) -> Option<std::ops::Range<usize>> {
    let start = i.checked_mul(stride)?.checked_add(offset)?;
    let end = start.checked_add(element_size)?;
    Some(start..end)
}

fn read_positions(
    doc: &Document,
    buffers: &[Vec<u8>],
    index: usize,
) -> Result<Vec<[f32; 3]>, LoadError> {
    let accessor = accessor(doc, index)?;
    if accessor.component_type != FLOAT || accessor.kind != "VEC3" {
        return Err(LoadError::UnsupportedAccessor {
            index,
            reason: format!(
                "positions must be FLOAT VEC3, got {} {}",
                accessor.component_type, accessor.kind
            ),
        });
    }

    let elements = accessor_elements(doc, buffers, index, accessor, 12)?;
    Ok(elements
        .into_iter()
        .map(|bytes| {
            let f = |o: usize| f32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
            [f(0), f(4), f(8)]
        })
        .collect())
}

fn read_indices(doc: &Document, buffers: &[Vec<u8>], index: usize) -> Result<Vec<u32>, LoadError> {
    let accessor = accessor(doc, index)?;
    let size = match accessor.component_type {
        UNSIGNED_BYTE => 1,
        UNSIGNED_SHORT => 2,
        UNSIGNED_INT => 4,
        other => {
            return Err(LoadError::UnsupportedAccessor {
                index,
                reason: format!("index component type {} is not an unsigned integer", other),
            })
        }
    };
    if accessor.kind != "SCALAR" {
        return Err(LoadError::UnsupportedAccessor {
            index,
            reason: format!("indices must be SCALAR, got {}", accessor.kind),
        });
    }

    let elements = accessor_elements(doc, buffers, index, accessor, size)?;
    Ok(elements
        .into_iter()
        .map(|b| match b.len() {
            1 => b[0] as u32,
            2 => u16::from_le_bytes([b[0], b[1]]) as u32,
            _ => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
        .collect())
}
