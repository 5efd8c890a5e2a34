#![warn(missing_docs)]

//! Math types for the gcam toolpath compiler.
//!
//! Thin wrappers around nalgebra providing the planar and spatial types
//! used by machining blocks, plus the precision constants shared by code
//! emission and stock simulation.

use nalgebra::{Vector2, Vector3};

/// A point in the XY machining plane.
pub type Point2 = nalgebra::Point2<f64>;

/// A point in 3D machine space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in the XY machining plane.
pub type Vec2 = Vector2<f64>;

/// A vector in 3D machine space.
pub type Vec3 = Vector3<f64>;

/// Geometric precision used for coincidence tests and no-op moves.
pub const PRECISION: f64 = 0.00001;

/// Millimeters per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Full turn in radians.
pub const TAU: f64 = std::f64::consts::TAU;

/// A planar rigid transform: rotation (degrees, about the origin) followed
/// by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2 {
    /// Translation applied after rotation.
    pub origin: Vec2,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
}

impl Transform2 {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            origin: Vec2::zeros(),
            rotation: 0.0,
        }
    }

    /// Rotation by `degrees` then translation by `(dx, dy)`.
    pub fn new(dx: f64, dy: f64, degrees: f64) -> Self {
        Self {
            origin: Vec2::new(dx, dy),
            rotation: degrees,
        }
    }

    /// Apply to a point.
    pub fn apply_point(&self, p: &Point2) -> Point2 {
        rotate(p, self.rotation) + self.origin
    }

    /// Apply to a direction (rotation only).
    pub fn apply_vec(&self, v: &Vec2) -> Vec2 {
        rotate(&Point2::from(*v), self.rotation).coords
    }

    /// Compose: `self` applied after `inner` (`self(inner(p))`).
    pub fn after(&self, inner: &Transform2) -> Self {
        Self {
            origin: self.apply_vec(&inner.origin) + self.origin,
            rotation: self.rotation + inner.rotation,
        }
    }

    /// True when this transform leaves points unchanged.
    pub fn is_identity(&self) -> bool {
        self.origin.norm() < PRECISION && self.rotation.abs() < PRECISION
    }
}

impl Default for Transform2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rotate a point about the origin by `degrees`, counter-clockwise.
pub fn rotate(p: &Point2, degrees: f64) -> Point2 {
    let (s, c) = degrees.to_radians().sin_cos();
    Point2::new(p.x * c - p.y * s, p.x * s + p.y * c)
}

/// Polar angle of `v` in radians, normalized to `[0, 2π)`.
pub fn angle_of(v: &Vec2) -> f64 {
    let a = v.y.atan2(v.x);
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// Point on a circle of `radius` around `center` at `angle` radians.
pub fn on_circle(center: &Point2, radius: f64, angle: f64) -> Point2 {
    let (s, c) = angle.sin_cos();
    Point2::new(center.x + radius * c, center.y + radius * s)
}

/// Check if two planar points coincide within [`PRECISION`].
pub fn points_equal(a: &Point2, b: &Point2) -> bool {
    (a - b).norm() < PRECISION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_90() {
        let p = rotate(&Point2::new(1.0, 0.0), 90.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_identity() {
        let t = Transform2::identity();
        let p = Point2::new(3.0, -2.0);
        assert!(points_equal(&t.apply_point(&p), &p));
        assert!(t.is_identity());
    }

    #[test]
    fn test_transform_compose() {
        // inner: translate (1,0); outer: rotate 90 then translate (0,5)
        let inner = Transform2::new(1.0, 0.0, 0.0);
        let outer = Transform2::new(0.0, 5.0, 90.0);
        let composed = outer.after(&inner);
        let p = Point2::origin();
        let direct = outer.apply_point(&inner.apply_point(&p));
        assert!(points_equal(&composed.apply_point(&p), &direct));
        assert!(points_equal(&direct, &Point2::new(0.0, 6.0)));
    }

    #[test]
    fn test_angle_of_wraps() {
        assert!((angle_of(&Vec2::new(0.0, -1.0)) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert!(angle_of(&Vec2::new(1.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_on_circle() {
        let p = on_circle(&Point2::new(1.0, 1.0), 2.0, std::f64::consts::FRAC_PI_2);
        assert!(points_equal(&p, &Point2::new(1.0, 3.0)));
    }
}
