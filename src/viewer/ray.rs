//! Rays, planes and intersection tests used for picking.

use cgmath::{InnerSpace, Point3, Vector3};

/// Tolerance for parallel rays and self-intersections.
const EPSILON: f32 = 1e-6;

/// A half-line with a unit-length direction, so `t` is a distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Create a ray; `direction` is normalized.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point at distance `t` along the ray.
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Distance to a triangle, hit from either side (Möller–Trumbore).
    pub fn intersect_triangle(
        &self,
        a: Point3<f32>,
        b: Point3<f32>,
        c: Point3<f32>,
    ) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }

        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }

    /// Intersection point with a plane, if the plane is ahead of the origin.
    pub fn intersect_plane(&self, plane: &Plane) -> Option<Point3<f32>> {
        let denom = plane.normal.dot(self.direction);
        let distance = plane.distance_to(self.origin);

        if denom.abs() < EPSILON {
            // Parallel: only a ray lying in the plane touches it
            return (distance.abs() < EPSILON).then_some(self.origin);
        }

        let t = -distance / denom;
        (t >= 0.0).then(|| self.at(t))
    }
}

/// Plane `normal · p + constant = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vector3<f32>, constant: f32) -> Self {
        Self {
            normal: normal.normalize(),
            constant,
        }
    }

    /// The horizontal plane `y = 0` annotations are placed on.
    pub fn ground() -> Self {
        Self::new(Vector3::unit_y(), 0.0)
    }

    /// Signed distance from the plane.
    pub fn distance_to(&self, point: Point3<f32>) -> f32 {
        self.normal.dot(point - Point3::new(0.0, 0.0, 0.0)) + self.constant
    }
}
