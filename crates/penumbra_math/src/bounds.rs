//! Axis-aligned bounding boxes for caster culling and light-space fitting

use glam::{Mat4, Vec3};

/// Axis-Aligned Bounding Box
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Empty (inverted) box; the identity for `union`
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
        max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
    };

    /// Create from min and max points
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Create from a set of points
    pub fn from_points(points: &[Vec3]) -> Self {
        points
            .iter()
            .fold(Self::EMPTY, |aabb, &point| aabb.expand_to_include(point))
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full extents along each axis
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if the AABB is empty (inverted on any axis)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand to include a point
    #[inline]
    pub fn expand_to_include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Smallest box enclosing both boxes
    #[inline]
    pub fn union(&self, other: &AABB) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Check if a point is inside (boundary inclusive)
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Check if another AABB is fully contained
    #[inline]
    pub fn contains_aabb(&self, other: &AABB) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Check if two AABBs overlap (touching counts)
    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Grow every axis whose extent is below `min_extent` to exactly
    /// `min_extent`, keeping the axis centered.
    pub fn pad_to_min_extent(&self, min_extent: f32) -> Self {
        let mut result = *self;
        for axis in 0..3 {
            let extent = result.max[axis] - result.min[axis];
            if extent < min_extent {
                let mid = (result.max[axis] + result.min[axis]) * 0.5;
                result.min[axis] = mid - min_extent * 0.5;
                result.max[axis] = mid + min_extent * 0.5;
            }
        }
        result
    }

    /// Transform the AABB by a matrix (result is still axis-aligned)
    ///
    /// Corners are re-fitted after a full point transform, so projective
    /// matrices are handled with a perspective divide.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        self.corners()
            .iter()
            .fold(Self::EMPTY, |aabb, &corner| {
                aabb.expand_to_include(matrix.project_point3(corner))
            })
    }

    /// The 8 corners, bit0 = max.x, bit1 = max.y, bit2 = max.z
    pub fn corners(&self) -> [Vec3; 8] {
        core::array::from_fn(|i| {
            Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            )
        })
    }
}

impl Default for AABB {
    fn default() -> Self {
        Self::EMPTY
    }
}
