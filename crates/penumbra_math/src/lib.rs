//! # penumbra_math - Shadow Culling Geometry
//!
//! Geometry primitives used by the cascaded shadow map engine:
//! - Axis-aligned bounding boxes with union, containment and transform
//! - Eight-corner view frustums built from camera parameters or boxes
//! - Swept separating-axis tests between a moving box and a frustum
//!
//! Vector and matrix types come from `glam` and are re-exported so callers
//! do not need a direct dependency.

pub mod bounds;
pub mod frustum;
pub mod sweep;

pub use bounds::*;
pub use frustum::*;
pub use sweep::*;

pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// Common math constants
pub mod consts {
    /// Threshold below which a direction is treated as zero-length
    pub const EPSILON: f32 = 1e-6;
    /// Squared length below which a cross-product axis is discarded
    pub const AXIS_EPSILON_SQ: f32 = 1e-12;
}

pub mod prelude {
    pub use crate::bounds::AABB;
    pub use crate::frustum::{Frustum, Plane};
    pub use crate::sweep::{sweep_intersects, SweepInterval};
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
}
