//! Shared fixtures: a backend that records commands and box renderables

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use penumbra_shadow::prelude::*;
use penumbra_shadow::{BackendError, BufferUsage, DepthDraw, DepthTargetHandle, Viewport};

/// Commands seen by the recording backend
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTarget(DepthTargetHandle, u32),
    DestroyTarget(DepthTargetHandle),
    CreateBuffer(BufferHandle, BufferUsage, u64),
    DestroyBuffer(BufferHandle),
    Write(BufferHandle, usize),
    SetTarget(DepthTargetHandle, Viewport),
    Clear(DepthTargetHandle, f32),
    BindConstants(BufferHandle, u32),
    BindShadowMap(DepthTargetHandle, u32),
    Draw(DepthDraw),
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub commands: Vec<Command>,
    pub live_targets: HashSet<DepthTargetHandle>,
    pub live_buffers: HashMap<BufferHandle, u64>,
    pub buffer_data: HashMap<BufferHandle, Vec<u8>>,
    /// Fail every depth target creation after this many successes
    pub target_budget: Option<usize>,
    /// Fail instance buffer creation larger than this many bytes
    pub max_instance_bytes: Option<u64>,
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_log(&mut self) {
        self.commands.clear();
    }

    pub fn draws(&self) -> Vec<DepthDraw> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> Vec<DepthTargetHandle> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Clear(target, _) => Some(*target),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl ShadowBackend for RecordingBackend {
    fn create_depth_target(&mut self, size: u32) -> Result<DepthTargetHandle, BackendError> {
        if let Some(budget) = self.target_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::OutOfMemory("depth target"));
            }
            *budget -= 1;
        }
        let handle = DepthTargetHandle(self.next());
        self.live_targets.insert(handle);
        self.commands.push(Command::CreateTarget(handle, size));
        Ok(handle)
    }

    fn destroy_depth_target(&mut self, target: DepthTargetHandle) {
        assert!(self.live_targets.remove(&target), "double destroy of {target:?}");
        self.commands.push(Command::DestroyTarget(target));
    }

    fn create_buffer(&mut self, usage: BufferUsage, size: u64) -> Result<BufferHandle, BackendError> {
        if usage == BufferUsage::Instance && self.max_instance_bytes.is_some_and(|max| size > max) {
            return Err(BackendError::OutOfMemory("instance buffer"));
        }
        let handle = BufferHandle(self.next());
        self.live_buffers.insert(handle, size);
        self.commands.push(Command::CreateBuffer(handle, usage, size));
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        assert!(self.live_buffers.remove(&buffer).is_some(), "double destroy of {buffer:?}");
        self.buffer_data.remove(&buffer);
        self.commands.push(Command::DestroyBuffer(buffer));
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let size = self.live_buffers[&buffer];
        assert!(offset + data.len() as u64 <= size, "write past end of {buffer:?}");
        let contents = self.buffer_data.entry(buffer).or_default();
        contents.resize(size as usize, 0);
        contents[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        self.commands.push(Command::Write(buffer, data.len()));
    }

    fn set_depth_target(&mut self, target: DepthTargetHandle, viewport: Viewport) {
        assert!(self.live_targets.contains(&target));
        self.commands.push(Command::SetTarget(target, viewport));
    }

    fn clear_depth(&mut self, target: DepthTargetHandle, depth: f32) {
        self.commands.push(Command::Clear(target, depth));
    }

    fn bind_cascade_constants(&mut self, buffer: BufferHandle, cascade: u32) {
        assert!(self.live_buffers.contains_key(&buffer));
        self.commands.push(Command::BindConstants(buffer, cascade));
    }

    fn bind_shadow_map(&mut self, target: DepthTargetHandle, slot: u32) {
        self.commands.push(Command::BindShadowMap(target, slot));
    }

    fn draw(&mut self, draw: &DepthDraw) {
        self.commands.push(Command::Draw(*draw));
    }
}

/// Axis-aligned box mesh, optionally split into stacked subsets
#[derive(Clone, Debug)]
pub struct BoxRenderable {
    pub id: u64,
    pub bounds: AABB,
    pub subsets: u32,
    pub casts: bool,
}

impl BoxRenderable {
    pub fn new(id: u64, center: Vec3, half_extents: Vec3) -> Self {
        Self {
            id,
            bounds: AABB::from_center_half_extents(center, half_extents),
            subsets: 1,
            casts: true,
        }
    }

    pub fn with_subsets(mut self, subsets: u32) -> Self {
        self.subsets = subsets;
        self
    }
}

impl ShadowRenderable for BoxRenderable {
    fn world_bounds(&self) -> AABB {
        self.bounds
    }

    fn subset_count(&self) -> u32 {
        self.subsets
    }

    fn subset_bounds(&self, subset: u32) -> AABB {
        // Horizontal slabs stacked along Y
        let height = self.bounds.size().y / self.subsets as f32;
        let mut bounds = self.bounds;
        bounds.min.y = self.bounds.min.y + height * subset as f32;
        bounds.max.y = bounds.min.y + height;
        bounds
    }

    fn casts_shadows(&self) -> bool {
        self.casts
    }

    fn write_instance(&self, subset: u32, instance: &mut ShadowInstance) {
        let center = self.subset_bounds(subset).center();
        *instance = ShadowInstance::from_model(Mat4::from_translation(center));
        instance.custom = [self.id as f32, subset as f32, 0.0, 0.0];
    }

    fn render_depth_only(
        &self,
        backend: &mut dyn ShadowBackend,
        subset: u32,
        instance_offset: u32,
        instance_count: u32,
        instance_buffer: BufferHandle,
    ) {
        backend.draw(&DepthDraw {
            geometry: self.id,
            subset,
            first_instance: instance_offset,
            instance_count,
            instance_buffer,
        });
    }
}

/// Camera at (0, 10, 30) looking at the origin, 60 degree fov
pub fn camera() -> PerspectiveCamera {
    PerspectiveCamera::look_at(
        Vec3::new(0.0, 10.0, 30.0),
        Vec3::ZERO,
        Vec3::Y,
        60f32.to_radians(),
        16.0 / 9.0,
        0.1,
        100.0,
    )
}

/// Sun shining mostly downward
pub fn sun() -> LightShadowConfig {
    LightShadowConfig::directional(Vec3::new(0.3, -1.0, -0.2))
}

/// Ground slab and a few boxes standing on it in front of the camera
pub fn scene() -> Vec<BoxRenderable> {
    vec![
        BoxRenderable::new(1, Vec3::new(0.0, -0.5, 0.0), Vec3::new(40.0, 0.5, 40.0)),
        BoxRenderable::new(2, Vec3::new(0.0, 1.0, 10.0), Vec3::splat(1.0)),
        BoxRenderable::new(3, Vec3::new(-4.0, 2.0, -10.0), Vec3::new(1.0, 2.0, 1.0)),
        BoxRenderable::new(4, Vec3::new(6.0, 3.0, -40.0), Vec3::new(2.0, 3.0, 2.0)).with_subsets(3),
    ]
}

pub fn as_dyn(boxes: &[BoxRenderable]) -> Vec<&dyn ShadowRenderable> {
    boxes.iter().map(|b| b as &dyn ShadowRenderable).collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
