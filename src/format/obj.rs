//! Wavefront OBJ parser.
//!
//! Reads the geometry subset of OBJ needed to produce glTF meshes:
//!
//! - `v x y z [w]` positions
//! - `vn x y z` normals
//! - `vt u [v [w]]` texture coordinates (counted so indices stay aligned, not emitted)
//! - `f` faces with `v`, `v/vt`, `v//vn` and `v/vt/vn` corners, 1-based or
//!   negative (relative) indices; polygons are fan-triangulated
//! - `o name` / `g name` start a new named group
//!
//! Every group becomes one mesh node named after the group, which is how
//! a clicked object in the viewer resolves to a component id. Material
//! libraries, smoothing groups, lines and points are ignored.

use std::collections::HashMap;

use crate::error::ConvertError;

use super::mesh::{face_normal, MeshGroup};

/// A face corner after index resolution (0-based).
#[derive(Debug, Clone, Copy)]
struct Corner {
    position: usize,
    normal: Option<usize>,
}

/// Group under construction, with a vertex cache keyed by (position, normal).
struct GroupBuilder {
    group: MeshGroup,
    shared: HashMap<(usize, usize), u32>,
}

impl GroupBuilder {
    fn new(name: String) -> Self {
        Self {
            group: MeshGroup::new(name),
            shared: HashMap::new(),
        }
    }

    fn shared_vertex(&mut self, corner: Corner, normal_index: usize, obj: &ObjData) -> u32 {
        let key = (corner.position, normal_index);
        if let Some(&index) = self.shared.get(&key) {
            return index;
        }
        let index = self
            .group
            .push_vertex(obj.positions[corner.position], obj.normals[normal_index]);
        self.shared.insert(key, index);
        index
    }

    fn push_triangle(&mut self, corners: [Corner; 3], obj: &ObjData) {
        match (corners[0].normal, corners[1].normal, corners[2].normal) {
            (Some(a), Some(b), Some(c)) => {
                let indices = [
                    self.shared_vertex(corners[0], a, obj),
                    self.shared_vertex(corners[1], b, obj),
                    self.shared_vertex(corners[2], c, obj),
                ];
                self.group.indices.extend_from_slice(&indices);
            }
            _ => {
                let points = corners.map(|c| obj.positions[c.position]);
                let normal = face_normal(points[0], points[1], points[2]);
                self.group.push_flat_triangle(points, Some(normal));
            }
        }
    }
}

#[derive(Default)]
struct ObjData {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: usize,
}

/// Parse OBJ source into named triangle groups.
///
/// Geometry that appears before any `o`/`g` statement is placed in a group
/// called `default_name` (the upload's file stem). Empty groups are dropped.
///
/// # Errors
/// * `ConvertError::Parse` - malformed number or face
/// * `ConvertError::IndexOutOfRange` - face references an undefined vertex
/// * `ConvertError::EmptyMesh` - no faces at all
pub fn parse_obj(source: &str, default_name: &str) -> Result<Vec<MeshGroup>, ConvertError> {
    let mut data = ObjData::default();
    let mut finished: Vec<MeshGroup> = Vec::new();
    let mut current = GroupBuilder::new(default_name.to_string());

    for (line_index, raw_line) in source.lines().enumerate() {
        let line_no = line_index + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or("");
        let args: Vec<&str> = tokens.collect();

        match keyword {
            "v" => data.positions.push(parse_vec3(&args, line_no, "v")?),
            "vn" => data.normals.push(parse_vec3(&args, line_no, "vn")?),
            "vt" => data.texcoords += 1,
            "o" | "g" => {
                let name = if args.is_empty() {
                    default_name.to_string()
                } else {
                    args.join(" ")
                };
                if current.group.is_empty() {
                    current.group.name = name;
                } else {
                    let done = std::mem::replace(&mut current, GroupBuilder::new(name));
                    finished.push(done.group);
                }
            }
            "f" => {
                if args.len() < 3 {
                    return Err(ConvertError::Parse {
                        line: line_no,
                        message: format!("face needs at least 3 vertices, got {}", args.len()),
                    });
                }
                let corners = args
                    .iter()
                    .map(|token| parse_corner(token, line_no, &data))
                    .collect::<Result<Vec<_>, _>>()?;
                for k in 1..corners.len() - 1 {
                    current.push_triangle([corners[0], corners[k], corners[k + 1]], &data);
                }
            }
            _ => {}
        }
    }

    finished.push(current.group);
    finished.retain(|group| !group.is_empty());

    if finished.is_empty() {
        return Err(ConvertError::EmptyMesh);
    }
    Ok(finished)
}

fn parse_vec3(args: &[&str], line: usize, keyword: &str) -> Result<[f32; 3], ConvertError> {
    if args.len() < 3 {
        return Err(ConvertError::Parse {
            line,
            message: format!("'{}' needs 3 components, got {}", keyword, args.len()),
        });
    }
    let mut out = [0.0f32; 3];
    for (slot, token) in out.iter_mut().zip(args) {
        let value: f32 = token.parse().map_err(|_| ConvertError::Parse {
            line,
            message: format!("invalid number '{}'", token),
        })?;
        if !value.is_finite() {
            return Err(ConvertError::Parse {
                line,
                message: format!("non-finite number '{}'", token),
            });
        }
        *slot = value;
    }
    Ok(out)
}

fn parse_corner(token: &str, line: usize, data: &ObjData) -> Result<Corner, ConvertError> {
    let mut parts = token.split('/');
    let position_ref = parts.next().unwrap_or("");
    let texcoord_ref = parts.next().unwrap_or("");
    let normal_ref = parts.next().unwrap_or("");

    let position = resolve_index(position_ref, data.positions.len(), line, "vertices")?.ok_or(
        ConvertError::Parse {
            line,
            message: format!("face corner '{}' has no vertex index", token),
        },
    )?;
    resolve_index(texcoord_ref, data.texcoords, line, "texture coordinates")?;
    let normal = resolve_index(normal_ref, data.normals.len(), line, "normals")?;

    Ok(Corner { position, normal })
}

/// Resolve a 1-based or negative OBJ index; empty references are `None`.
fn resolve_index(
    reference: &str,
    count: usize,
    line: usize,
    kind: &'static str,
) -> Result<Option<usize>, ConvertError> {
    if reference.is_empty() {
        return Ok(None);
    }
    let index: i64 = reference.parse().map_err(|_| ConvertError::Parse {
        line,
        message: format!("invalid index '{}'", reference),
    })?;

    let resolved = if index > 0 {
        index - 1
    } else {
        count as i64 + index
    };

    if index == 0 || resolved < 0 || resolved >= count as i64 {
        return Err(ConvertError::IndexOutOfRange {
            line,
            index,
            count,
            kind,
        });
    }
    Ok(Some(resolved as usize))
}

// =============================================================================
// Tests
// =============================================================================
