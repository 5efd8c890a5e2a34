//! Offset context inherited from enclosing containers.

use gcam_kernel_math::{Point2, Transform2};

/// Placement and cutter compensation applied to a node's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    /// Accumulated container transform.
    pub transform: Transform2,
    /// Cut side along the left normal: +1 left, -1 right, 0 on the line.
    pub side: f64,
    /// Tool radius used for compensation.
    pub tool: f64,
}

impl Offset {
    /// No transform and no compensation.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Map a raw point into machine coordinates.
    pub fn apply(&self, p: &Point2) -> Point2 {
        self.transform.apply_point(p)
    }

    /// Signed compensation distance along the left normal.
    pub fn compensation(&self) -> f64 {
        self.side * self.tool
    }

    /// Nest this context inside a container transform.
    pub fn within(&self, outer: &Transform2) -> Self {
        Self {
            transform: outer.after(&self.transform),
            ..*self
        }
    }

    /// Rotation component in degrees.
    pub fn rotation(&self) -> f64 {
        self.transform.rotation
    }
}
