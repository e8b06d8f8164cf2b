//! Depth pass submission
//!
//! Packs every cascade's casters into the shared instance buffer with one
//! write, then renders each drawn cascade into its depth target with one
//! draw per caster. A cascade without casters is skipped, except that a
//! target rendered into last frame gets a single clear so stale depth is
//! not left behind.

use crate::backend::{ShadowBackend, Viewport};
use crate::data::ShadowInstance;
use crate::scene::ShadowRenderable;
use crate::system::ShadowSystem;

/// Cleared depth: the far plane under reversed-Z
pub const CLEAR_DEPTH: f32 = 0.0;

/// What one `render` call issued
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub draw_calls: usize,
    pub cascades_rendered: usize,
    pub stale_clears: usize,
    pub instances: usize,
    /// Whether the cascade constants were uploaded
    pub constants_uploaded: bool,
}

impl ShadowSystem {
    /// Draw the casters found by the last `compute_cascades`
    ///
    /// `renderables` must be the slice that was passed to
    /// `compute_cascades`.
    pub fn render(&mut self, renderables: &[&dyn ShadowRenderable], backend: &mut dyn ShadowBackend) -> SubmitStats {
        let mut stats = SubmitStats {
            constants_uploaded: self.constants.upload(backend),
            ..Default::default()
        };

        let Some(instance_buffer) = self.instances.handle() else {
            return stats;
        };

        self.staging.clear();
        for caster in self.cascades.iter().flat_map(|c| &c.casters) {
            let mut instance = ShadowInstance::default();
            match renderables.get(caster.renderable) {
                Some(renderable) => renderable.write_instance(caster.subset, &mut instance),
                None => log::warn!("Shadow caster refers to missing renderable {}", caster.renderable),
            }
            self.staging.push(instance);
        }
        if self.staging.len() > self.instances.capacity() as usize {
            log::error!(
                "{} shadow instances exceed buffer capacity {}",
                self.staging.len(),
                self.instances.capacity()
            );
            return stats;
        }
        if !self.staging.is_empty() {
            backend.write_buffer(instance_buffer, 0, bytemuck::cast_slice(&self.staging));
        }
        stats.instances = self.staging.len();

        let constants = self.constants.current_buffer();
        let mut offset = 0u32;
        for (index, state) in self.cascades.iter_mut().enumerate() {
            let Some(target) = self.targets.get(index) else {
                offset += state.casters.len() as u32;
                continue;
            };

            if state.casters.is_empty() {
                if state.rendered_last_frame {
                    backend.set_depth_target(target.handle, Viewport::square(target.size));
                    backend.clear_depth(target.handle, CLEAR_DEPTH);
                    stats.stale_clears += 1;
                    log::trace!("Cascade {index} cleared, no casters this frame");
                }
                state.rendered_last_frame = false;
                continue;
            }

            backend.set_depth_target(target.handle, Viewport::square(target.size));
            backend.clear_depth(target.handle, CLEAR_DEPTH);
            if let Some(constants) = constants {
                backend.bind_cascade_constants(constants, index as u32);
            }

            for caster in &state.casters {
                if let Some(renderable) = renderables.get(caster.renderable) {
                    renderable.render_depth_only(backend, caster.subset, offset, 1, instance_buffer);
                    stats.draw_calls += 1;
                }
                offset += 1;
            }

            state.rendered_last_frame = true;
            stats.cascades_rendered += 1;
        }

        log::trace!(
            "Shadow pass: {} draws in {} cascades, {} stale clears",
            stats.draw_calls,
            stats.cascades_rendered,
            stats.stale_clears
        );
        stats
    }
}
