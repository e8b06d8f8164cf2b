//! GPU Shadow Data Structures
//!
//! All structures are bytemuck Pod/Zeroable for direct GPU upload.

use glam::Mat4;

use crate::backend::{BufferHandle, BufferUsage, ShadowBackend};
use crate::error::BackendError;
use crate::MAX_CASCADES;

/// Per-caster instance data in the shared instance buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowInstance {
    /// World transform (column-major)
    pub model: [[f32; 4]; 4],

    /// Renderable-defined extra data (skinning offset, alpha-test ref, ...)
    pub custom: [f32; 4],
}

impl Default for ShadowInstance {
    fn default() -> Self {
        Self::from_model(Mat4::IDENTITY)
    }
}

impl ShadowInstance {
    pub fn from_model(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            custom: [0.0; 4],
        }
    }
}

/// Cascade constants read by the depth pass and the sampling shader
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuCascadeUniforms {
    /// Reversed-Z light view-projection per cascade
    pub view_projections: [[[f32; 4]; 4]; MAX_CASCADES],

    /// Far split distance of each cascade (view-space depth)
    pub splits: [f32; MAX_CASCADES],

    /// xy = world-space texel size, zw = shadow map size in texels
    pub texel_sizes: [[f32; 4]; MAX_CASCADES],

    /// Number of active cascades
    pub cascade_count: u32,

    /// Bit i set when cascade i was drawn this frame
    pub drawn_mask: u32,

    /// Filter radius in texels
    pub sampling_radius: f32,

    /// Filter tap count
    pub sample_count: u32,
}

impl Default for GpuCascadeUniforms {
    fn default() -> Self {
        Self {
            view_projections: [Mat4::IDENTITY.to_cols_array_2d(); MAX_CASCADES],
            splits: [0.0; MAX_CASCADES],
            texel_sizes: [[0.0; 4]; MAX_CASCADES],
            cascade_count: 0,
            drawn_mask: 0,
            sampling_radius: 0.0,
            sample_count: 0,
        }
    }
}

impl GpuCascadeUniforms {
    /// Check if a cascade should be sampled
    pub fn is_drawn(&self, cascade: usize) -> bool {
        cascade < MAX_CASCADES && self.drawn_mask & (1 << cascade) != 0
    }
}

/// Double-buffered cascade constants
///
/// Writes land in the back CPU mirror and raise `update_pending`. An upload
/// pushes the back mirror to its GPU buffer and makes it current, so the
/// buffer a previous frame may still be reading is never overwritten. The
/// mirrors flip per upload, not per frame.
#[derive(Debug)]
pub struct CascadeConstants {
    mirrors: [GpuCascadeUniforms; 2],
    buffers: [Option<BufferHandle>; 2],
    current: usize,
    update_pending: bool,
}

impl CascadeConstants {
    pub fn acquire(backend: &mut dyn ShadowBackend) -> Result<Self, BackendError> {
        let size = std::mem::size_of::<GpuCascadeUniforms>() as u64;
        let first = backend.create_buffer(BufferUsage::Uniform, size)?;
        let second = match backend.create_buffer(BufferUsage::Uniform, size) {
            Ok(buffer) => buffer,
            Err(err) => {
                backend.destroy_buffer(first);
                return Err(err);
            }
        };
        Ok(Self {
            mirrors: [GpuCascadeUniforms::default(); 2],
            buffers: [Some(first), Some(second)],
            current: 0,
            update_pending: false,
        })
    }

    /// Stage new constants for the next upload
    pub fn write(&mut self, uniforms: GpuCascadeUniforms) {
        self.mirrors[1 - self.current] = uniforms;
        self.update_pending = true;
    }

    /// Upload staged constants if any; returns whether an upload happened
    pub fn upload(&mut self, backend: &mut dyn ShadowBackend) -> bool {
        if !self.update_pending {
            return false;
        }
        let back = 1 - self.current;
        if let Some(buffer) = self.buffers[back] {
            backend.write_buffer(buffer, 0, bytemuck::bytes_of(&self.mirrors[back]));
        }
        self.current = back;
        self.update_pending = false;
        true
    }

    /// Constants as they will be after the next upload
    pub fn latest(&self) -> &GpuCascadeUniforms {
        if self.update_pending {
            &self.mirrors[1 - self.current]
        } else {
            &self.mirrors[self.current]
        }
    }

    pub fn current_buffer(&self) -> Option<BufferHandle> {
        self.buffers[self.current]
    }

    pub fn release(mut self, backend: &mut dyn ShadowBackend) {
        for buffer in self.buffers.iter_mut().filter_map(Option::take) {
            backend.destroy_buffer(buffer);
        }
    }
}

impl Drop for CascadeConstants {
    fn drop(&mut self) {
        if self.buffers.iter().any(Option::is_some) {
            log::warn!("Cascade constant buffers dropped without release");
        }
    }
}
