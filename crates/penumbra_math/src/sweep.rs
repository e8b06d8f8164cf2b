//! Swept separating-axis tests
//!
//! Decides whether an axis-aligned box, translated along a direction by a
//! non-negative amount `t`, ever overlaps a convex frustum. Each candidate
//! separating axis narrows the admissible `t` range; an empty range on any
//! axis proves the swept box misses the frustum.
//!
//! The axis battery is complete for two convex polyhedra:
//! - the box's 3 face normals
//! - the frustum's 6 face normals
//! - the 3 x 6 cross products of box edges with frustum edges

use glam::Vec3;

use crate::bounds::AABB;
use crate::consts::{AXIS_EPSILON_SQ, EPSILON};
use crate::frustum::Frustum;

/// Range of sweep distances for which the moving box overlaps the frustum
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepInterval {
    pub t_min: f32,
    pub t_max: f32,
}

impl SweepInterval {
    /// Forward-only sweep, the starting range for every test
    pub const FORWARD: Self = Self {
        t_min: 0.0,
        t_max: f32::INFINITY,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.t_min > self.t_max
    }

    #[inline]
    fn clip(&mut self, lo: f32, hi: f32) {
        self.t_min = self.t_min.max(lo);
        self.t_max = self.t_max.min(hi);
    }
}

/// Project the frustum corners onto an axis
#[inline]
fn project_corners(corners: &[Vec3; 8], axis: Vec3) -> (f32, f32) {
    corners.iter().fold((f32::MAX, f32::MIN), |(lo, hi), c| {
        let d = axis.dot(*c);
        (lo.min(d), hi.max(d))
    })
}

/// Narrow `range` by one candidate axis; returns false once it is empty
fn clip_axis(
    range: &mut SweepInterval,
    axis: Vec3,
    center: Vec3,
    half: Vec3,
    corners: &[Vec3; 8],
    direction: Vec3,
) -> bool {
    let c = axis.dot(center);
    let r = half.x * axis.x.abs() + half.y * axis.y.abs() + half.z * axis.z.abs();
    let (box_min, box_max) = (c - r, c + r);
    let (frustum_min, frustum_max) = project_corners(corners, axis);

    let speed = axis.dot(direction);
    if speed.abs() <= EPSILON * axis.length() {
        // Sweep does not move the projection along this axis
        return box_min <= frustum_max && box_max >= frustum_min;
    }

    let enter = (frustum_min - box_max) / speed;
    let leave = (frustum_max - box_min) / speed;
    if speed > 0.0 {
        range.clip(enter, leave);
    } else {
        range.clip(leave, enter);
    }
    !range.is_empty()
}

/// Compute the forward sweep range over which `aabb + t * direction`
/// overlaps `frustum`, or `None` if it never does.
pub fn sweep_interval(aabb: &AABB, frustum: &Frustum, direction: Vec3) -> Option<SweepInterval> {
    if aabb.is_empty() {
        return None;
    }

    let center = aabb.center();
    let half = aabb.half_extents();
    let corners = frustum.corners();
    let mut range = SweepInterval::FORWARD;

    const BOX_AXES: [Vec3; 3] = [Vec3::X, Vec3::Y, Vec3::Z];

    for axis in BOX_AXES {
        if !clip_axis(&mut range, axis, center, half, corners, direction) {
            return None;
        }
    }

    for normal in frustum.face_normals() {
        if normal.length_squared() <= AXIS_EPSILON_SQ {
            continue;
        }
        if !clip_axis(&mut range, normal, center, half, corners, direction) {
            return None;
        }
    }

    for box_edge in BOX_AXES {
        for frustum_edge in frustum.edge_directions() {
            let axis = box_edge.cross(frustum_edge);
            if axis.length_squared() <= AXIS_EPSILON_SQ * frustum_edge.length_squared() {
                continue;
            }
            if !clip_axis(&mut range, axis, center, half, corners, direction) {
                return None;
            }
        }
    }

    Some(range)
}

/// True when the box, swept forward along `direction`, meets the frustum
#[inline]
pub fn sweep_intersects(aabb: &AABB, frustum: &Frustum, direction: Vec3) -> bool {
    sweep_interval(aabb, frustum, direction).is_some()
}

/// Conservative variant that sweeps against the frustum's bounding box
#[inline]
pub fn sweep_intersects_bounds(aabb: &AABB, frustum: &Frustum, direction: Vec3) -> bool {
    sweep_intersects(aabb, &Frustum::from_aabb(&frustum.aabb()), direction)
}
