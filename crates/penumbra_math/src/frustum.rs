//! View frustums described by their eight corners
//!
//! Cascade slices, their light-space images and bounding boxes all share the
//! same corner layout so the sweep test can treat them uniformly.

use glam::{Mat4, Vec3};

use crate::bounds::AABB;

/// Plane in 3D space (normal · p + distance = 0)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Plane normal (unit vector)
    pub normal: Vec3,
    /// Distance from origin along normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from a point on the plane and its normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            distance: -normal.dot(point),
        }
    }

    /// Signed distance, positive on the side the normal points to
    #[inline]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vec3::Y,
            distance: 0.0,
        }
    }
}

/// Convex view volume with eight corners
///
/// Corner index bits: bit0 = right (+X), bit1 = up (+Y), bit2 = far plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub corners: [Vec3; 8],
}

impl Frustum {
    /// Corner indices for each face: near, far, left, right, bottom, top
    pub const FACES: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [4, 5, 6, 7],
        [0, 2, 4, 6],
        [1, 3, 5, 7],
        [0, 1, 4, 5],
        [2, 3, 6, 7],
    ];

    #[inline]
    pub const fn from_corners(corners: [Vec3; 8]) -> Self {
        Self { corners }
    }

    /// Build a perspective slice between `near` and `far` view distances
    ///
    /// `camera_to_world` is the inverse of a right-handed view matrix
    /// (camera looks down -Z).
    pub fn from_perspective(
        camera_to_world: &Mat4,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let tan_half = (fov_y * 0.5).tan();
        let corners = core::array::from_fn(|i| {
            let depth = if i & 4 != 0 { far } else { near };
            let sx = if i & 1 != 0 { 1.0 } else { -1.0 };
            let sy = if i & 2 != 0 { 1.0 } else { -1.0 };
            let view = Vec3::new(
                sx * depth * tan_half * aspect,
                sy * depth * tan_half,
                -depth,
            );
            camera_to_world.transform_point3(view)
        });
        Self { corners }
    }

    /// Treat a box as a (degenerate, parallel-sided) frustum
    pub fn from_aabb(aabb: &AABB) -> Self {
        Self {
            corners: aabb.corners(),
        }
    }

    #[inline]
    pub fn corners(&self) -> &[Vec3; 8] {
        &self.corners
    }

    /// Transform every corner, with perspective divide
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self {
            corners: self.corners.map(|c| matrix.project_point3(c)),
        }
    }

    /// Axis-aligned bounds of the corners
    pub fn aabb(&self) -> AABB {
        AABB::from_points(&self.corners)
    }

    /// Mean of the corners, always strictly inside a non-degenerate frustum
    pub fn centroid(&self) -> Vec3 {
        self.corners.iter().copied().sum::<Vec3>() / 8.0
    }

    /// Face planes with normals pointing into the volume
    pub fn planes(&self) -> [Plane; 6] {
        let centroid = self.centroid();
        Self::FACES.map(|face| {
            let origin = self.corners[face[0]];
            let normal = self.face_normal(face);
            let plane = Plane::from_point_normal(origin, normal);
            if plane.distance_to_point(centroid) < 0.0 {
                Plane {
                    normal: -plane.normal,
                    distance: -plane.distance,
                }
            } else {
                plane
            }
        })
    }

    /// Unnormalized face normals (orientation unspecified)
    pub fn face_normals(&self) -> [Vec3; 6] {
        Self::FACES.map(|face| self.face_normal(face))
    }

    /// The six distinct edge directions: near-plane X and Y edges, then the
    /// four side edges running from near to far
    pub fn edge_directions(&self) -> [Vec3; 6] {
        let c = &self.corners;
        [
            c[1] - c[0],
            c[2] - c[0],
            c[4] - c[0],
            c[5] - c[1],
            c[6] - c[2],
            c[7] - c[3],
        ]
    }

    /// Test if a point is inside, allowing `tolerance` outside each plane
    pub fn contains_point(&self, point: Vec3, tolerance: f32) -> bool {
        self.planes()
            .iter()
            .all(|plane| plane.distance_to_point(point) >= -tolerance)
    }

    /// Test if an AABB lies completely inside the frustum
    pub fn contains_aabb(&self, aabb: &AABB) -> bool {
        let planes = self.planes();
        aabb.corners()
            .iter()
            .all(|&corner| planes.iter().all(|p| p.distance_to_point(corner) >= 0.0))
    }

    fn face_normal(&self, face: [usize; 4]) -> Vec3 {
        // Diagonals of the quad are robust even when one edge collapses
        let a = self.corners[face[3]] - self.corners[face[0]];
        let b = self.corners[face[2]] - self.corners[face[1]];
        a.cross(b)
    }
}
