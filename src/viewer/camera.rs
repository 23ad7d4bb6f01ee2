//! Perspective camera and pointer-to-ray conversion.

use cgmath::{perspective, Deg, EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector2, Vector3, Vector4};

use super::ray::Ray;

/// A pointer position in canvas pixels, with the canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    /// Offset from the left edge of the canvas
    pub x: f32,

    /// Offset from the top edge of the canvas
    pub y: f32,

    pub width: f32,
    pub height: f32,
}

impl Pointer {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized device coordinates: x right and y up, both in `[-1, 1]`.
    ///
    /// `None` for a zero-sized canvas.
    pub fn to_ndc(&self) -> Option<Vector2<f32>> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(Vector2::new(
            self.x / self.width * 2.0 - 1.0,
            -(self.y / self.height) * 2.0 + 1.0,
        ))
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

/// Perspective camera orbiting a target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,

    /// Vertical field of view in degrees
    pub fov_y: f32,

    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    /// 60° field of view at `(0, 2, 5)` looking at the origin.
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 2.0, 5.0),
            target: Point3::origin(),
            up: Vector3::unit_y(),
            fov_y: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        perspective(Deg(self.fov_y), aspect, self.near, self.far)
    }

    /// Ray from the camera through a point given in NDC.
    pub fn ray_from_ndc(&self, ndc: Vector2<f32>, aspect: f32) -> Option<Ray> {
        let inverse = (self.projection_matrix(aspect) * self.view_matrix()).invert()?;
        let clip = inverse * Vector4::new(ndc.x, ndc.y, 0.5, 1.0);
        if clip.w.abs() <= f32::EPSILON {
            return None;
        }
        let world = Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w);
        Some(Ray::new(self.position, world - self.position))
    }

    /// Ray from the camera through the pixel under the pointer.
    pub fn ray(&self, pointer: &Pointer) -> Option<Ray> {
        self.ray_from_ndc(pointer.to_ndc()?, pointer.aspect())
    }
}
