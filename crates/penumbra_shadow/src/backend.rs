//! GPU backend interface and the resources the shadow system owns on it
//!
//! The backend is an external collaborator. Resources are plain handles;
//! ownership is tracked by [`CascadeTargets`] and [`InstanceBuffer`], which
//! acquire and release as a unit and complain if dropped while still
//! holding GPU objects.

use crate::error::BackendError;

/// Depth render target handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthTargetHandle(pub u32);

/// GPU buffer handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// What a buffer is bound as
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Per-instance vertex data
    Instance,
    /// Constant/uniform data
    Uniform,
}

/// Viewport rectangle in pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full square viewport for a shadow map
    pub fn square(size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size,
            height: size,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// One depth-only draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthDraw {
    /// Renderable-defined geometry key
    pub geometry: u64,
    pub subset: u32,
    pub first_instance: u32,
    pub instance_count: u32,
    pub instance_buffer: BufferHandle,
}

/// Commands the shadow pass needs from the GPU layer
pub trait ShadowBackend {
    fn create_depth_target(&mut self, size: u32) -> Result<DepthTargetHandle, BackendError>;

    fn destroy_depth_target(&mut self, target: DepthTargetHandle);

    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> Result<BufferHandle, BackendError>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Map, write `data` at byte `offset`, unmap
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn set_depth_target(&mut self, target: DepthTargetHandle, viewport: Viewport);

    fn clear_depth(&mut self, target: DepthTargetHandle, depth: f32);

    /// Bind the cascade constants and select which cascade's matrix to use
    fn bind_cascade_constants(&mut self, buffer: BufferHandle, cascade: u32);

    /// Bind a depth target as a sampled texture
    fn bind_shadow_map(&mut self, target: DepthTargetHandle, slot: u32);

    fn draw(&mut self, draw: &DepthDraw);
}

/// One cascade's depth target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthTarget {
    pub handle: DepthTargetHandle,
    pub size: u32,
}

/// Per-cascade depth targets, acquired and released as a whole
#[derive(Debug, Default)]
pub struct CascadeTargets {
    targets: Vec<DepthTarget>,
}

impl CascadeTargets {
    /// Create one target per entry of `sizes`
    ///
    /// On failure everything created so far is destroyed before the error
    /// is returned.
    pub fn acquire(backend: &mut dyn ShadowBackend, sizes: &[u32]) -> Result<Self, BackendError> {
        let mut targets = Vec::with_capacity(sizes.len());
        for &size in sizes {
            match backend.create_depth_target(size) {
                Ok(handle) => targets.push(DepthTarget { handle, size }),
                Err(err) => {
                    log::error!("Failed to create {size}x{size} shadow target: {err}");
                    for target in targets {
                        backend.destroy_depth_target(target.handle);
                    }
                    return Err(err);
                }
            }
        }
        log::debug!("Acquired {} cascade depth targets {:?}", targets.len(), sizes);
        Ok(Self { targets })
    }

    pub fn release(mut self, backend: &mut dyn ShadowBackend) {
        for target in self.targets.drain(..) {
            backend.destroy_depth_target(target.handle);
        }
    }

    pub fn get(&self, cascade: usize) -> Option<&DepthTarget> {
        self.targets.get(cascade)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Check whether these targets already have the requested sizes
    pub fn matches(&self, sizes: &[u32]) -> bool {
        self.targets.len() == sizes.len()
            && self.targets.iter().zip(sizes).all(|(t, &s)| t.size == s)
    }
}

impl Drop for CascadeTargets {
    fn drop(&mut self) {
        if !self.targets.is_empty() {
            log::warn!("{} cascade depth targets dropped without release", self.targets.len());
        }
    }
}

/// Shared instance buffer, sized in instances
#[derive(Debug)]
pub struct InstanceBuffer {
    handle: Option<BufferHandle>,
    capacity: u32,
    stride: u64,
}

impl InstanceBuffer {
    pub fn acquire(backend: &mut dyn ShadowBackend, capacity: u32, stride: u64) -> Result<Self, BackendError> {
        let handle = backend.create_buffer(BufferUsage::Instance, capacity as u64 * stride)?;
        Ok(Self {
            handle: Some(handle),
            capacity,
            stride,
        })
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Grow by `step` until `required` instances fit
    ///
    /// The replacement is created before the old buffer is destroyed, so a
    /// failure leaves the current buffer untouched. Returns whether the
    /// buffer was replaced.
    pub fn ensure_capacity(
        &mut self,
        backend: &mut dyn ShadowBackend,
        required: usize,
        step: u32,
    ) -> Result<bool, BackendError> {
        let step = step.max(1) as u64;
        let mut capacity = self.capacity as u64;
        while capacity < required as u64 {
            capacity += step;
        }
        if capacity == self.capacity as u64 {
            return Ok(false);
        }

        let capacity = u32::try_from(capacity)
            .map_err(|_| BackendError::Unsupported(format!("{capacity} shadow instances")))?;
        let handle = backend.create_buffer(BufferUsage::Instance, capacity as u64 * self.stride)?;
        if let Some(old) = self.handle.replace(handle) {
            backend.destroy_buffer(old);
        }
        log::debug!("Shadow instance buffer grown {} -> {}", self.capacity, capacity);
        self.capacity = capacity;
        Ok(true)
    }

    pub fn release(mut self, backend: &mut dyn ShadowBackend) {
        if let Some(handle) = self.handle.take() {
            backend.destroy_buffer(handle);
        }
    }
}

impl Drop for InstanceBuffer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            log::warn!("Shadow instance buffer dropped without release");
        }
    }
}
