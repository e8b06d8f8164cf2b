//! What the shadow system consumes from the scene: cameras and renderables
//!
//! The system never owns renderables. It borrows them for one frame and
//! refers to them by their index in the slice it was handed.

use glam::{Mat4, Vec3};
use penumbra_math::{Frustum, AABB};

use crate::backend::{BufferHandle, ShadowBackend};
use crate::data::ShadowInstance;

/// Camera whose view the cascades cover
pub trait ShadowCamera {
    fn near_plane(&self) -> f32;

    fn far_plane(&self) -> f32;

    /// World-space frustum slice between two view distances
    fn frustum(&self, near: f32, far: f32) -> Frustum;
}

/// Read-only view of a renderable for the depth pass
pub trait ShadowRenderable {
    /// World-space bounds of the whole renderable
    fn world_bounds(&self) -> AABB;

    /// Number of independently drawn subsets (meshes, material groups)
    fn subset_count(&self) -> u32 {
        1
    }

    /// World-space bounds of one subset
    fn subset_bounds(&self, _subset: u32) -> AABB {
        self.world_bounds()
    }

    fn casts_shadows(&self) -> bool {
        true
    }

    /// Fill the per-instance data for one subset
    fn write_instance(&self, subset: u32, instance: &mut ShadowInstance);

    /// Issue the depth-only draw for one subset
    fn render_depth_only(
        &self,
        backend: &mut dyn ShadowBackend,
        subset: u32,
        instance_offset: u32,
        instance_count: u32,
        instance_buffer: BufferHandle,
    );
}

/// Right-handed perspective camera looking down -Z
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveCamera {
    /// Inverse of the view matrix
    pub camera_to_world: Mat4,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(view: Mat4, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            camera_to_world: view.inverse(),
            fov_y,
            aspect,
            near,
            far,
        }
    }

    /// Camera at `eye` looking at `target`
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Mat4::look_at_rh(eye, target, up), fov_y, aspect, near, far)
    }

    pub fn view(&self) -> Mat4 {
        self.camera_to_world.inverse()
    }

    pub fn position(&self) -> Vec3 {
        self.camera_to_world.w_axis.truncate()
    }
}

impl ShadowCamera for PerspectiveCamera {
    fn near_plane(&self) -> f32 {
        self.near
    }

    fn far_plane(&self) -> f32 {
        self.far
    }

    fn frustum(&self, near: f32, far: f32) -> Frustum {
        Frustum::from_perspective(&self.camera_to_world, self.fov_y, self.aspect, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_slice_depths() {
        let camera = PerspectiveCamera::look_at(
            Vec3::new(0.0, 2.0, 10.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::Y,
            1.0,
            1.0,
            0.1,
            100.0,
        );
        assert!((camera.position() - Vec3::new(0.0, 2.0, 10.0)).length() < 1e-5);

        let slice = camera.frustum(5.0, 20.0);
        let bounds = slice.aabb();
        // Looking toward -Z from z = 10
        assert!((bounds.max.z - 5.0).abs() < 1e-4);
        assert!((bounds.min.z + 10.0).abs() < 1e-4);
    }
}
