//! Intermediate triangle mesh shared by the OBJ and STL parsers.

/// A named group of indexed triangles.
///
/// Each group becomes one glTF node, so `name` is what the viewer reports
/// when the group is clicked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGroup {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append a vertex and return its index.
    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.normals.push(normal);
        index
    }

    /// Append a triangle with its own three vertices sharing one normal.
    ///
    /// A zero-length `normal` is replaced by the computed face normal.
    pub fn push_flat_triangle(&mut self, corners: [[f32; 3]; 3], normal: Option<[f32; 3]>) {
        let normal = normal
            .and_then(normalize)
            .unwrap_or_else(|| face_normal(corners[0], corners[1], corners[2]));
        for corner in corners {
            let index = self.push_vertex(corner, normal);
            self.indices.push(index);
        }
    }

    /// Axis-aligned bounds of the positions, `None` for an empty group.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        let mut min = first;
        let mut max = first;
        for p in &self.positions[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Some((min, max))
    }
}

/// Unit normal of a counter-clockwise triangle.
///
/// Degenerate triangles get +Y so the output never contains NaNs.
pub fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let cross = [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ];
    normalize(cross).unwrap_or([0.0, 1.0, 0.0])
}

/// Scale to unit length, `None` when the vector is (nearly) zero.
pub fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON || !len.is_finite() {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}
