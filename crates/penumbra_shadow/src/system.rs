//! Cascaded shadow system
//!
//! `ShadowSystem` owns everything that persists across frames: the
//! configuration, per-cascade transforms and depth targets, the shared
//! instance buffer, the cascade constants and the worker pool.
//!
//! Per frame, `compute_cascades` splits the camera range, runs cull + fit
//! for every cascade on the pool, joins once, then grows the instance
//! buffer if the casters no longer fit. `render` (see `submit.rs`) draws
//! the result.

use std::sync::Arc;

use glam::{Mat4, Vec2};
use penumbra_math::Frustum;

use crate::backend::{CascadeTargets, InstanceBuffer, ShadowBackend};
use crate::config::{LightShadowConfig, ShadowConfig};
use crate::culler::Caster;
use crate::data::{CascadeConstants, GpuCascadeUniforms, ShadowInstance};
use crate::error::{Result, ShadowError};
use crate::fit::{fit_cascade, CascadeFit, CascadeTransform, FitSettings};
use crate::pool::CascadeWorkerPool;
use crate::scene::{ShadowCamera, ShadowRenderable};
use crate::split::compute_splits;
use crate::MAX_CASCADES;

/// Per-cascade state kept between frames
#[derive(Clone, Debug, Default)]
pub(crate) struct CascadeState {
    pub(crate) transform: CascadeTransform,
    pub(crate) casters: Vec<Caster>,
    pub(crate) drawn: bool,
    pub(crate) corrected: bool,
    /// Whether the depth target holds casters from an earlier frame
    pub(crate) rendered_last_frame: bool,
}

/// Statistics of the last `compute_cascades`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Renderable subsets offered to the culler
    pub candidates: usize,
    /// Casters found per cascade
    pub casters_per_cascade: [usize; MAX_CASCADES],
    /// Sum of all caster lists
    pub total_instances: usize,
    /// Cascades with at least one caster
    pub drawn_cascades: usize,
    /// Cascades that needed the second crop pass
    pub corrected_cascades: usize,
    /// Cascades whose job produced no result
    pub lost_cascades: usize,
    /// Instance buffer capacity after growth
    pub instance_capacity: u32,
    /// Whether the instance buffer was replaced this frame
    pub instance_buffer_grown: bool,
}

/// Cascaded shadow maps for one directional light
pub struct ShadowSystem {
    pub(crate) config: ShadowConfig,
    pub(crate) cascades: Vec<CascadeState>,
    pub(crate) splits: Vec<f32>,
    pub(crate) targets: CascadeTargets,
    pub(crate) constants: CascadeConstants,
    pub(crate) instances: InstanceBuffer,
    pub(crate) staging: Vec<ShadowInstance>,
    pool: CascadeWorkerPool,
    stats: FrameStats,
}

impl ShadowSystem {
    /// Validate `config` and allocate GPU resources and workers
    pub fn new(config: ShadowConfig, backend: &mut dyn ShadowBackend) -> Result<Self> {
        let config = config.validated()?;
        let pool = CascadeWorkerPool::new(MAX_CASCADES)?;

        let targets = CascadeTargets::acquire(backend, config.active_resolutions())?;
        let constants = match CascadeConstants::acquire(backend) {
            Ok(constants) => constants,
            Err(err) => {
                targets.release(backend);
                return Err(err.into());
            }
        };
        let stride = std::mem::size_of::<ShadowInstance>() as u64;
        let instances = match InstanceBuffer::acquire(backend, config.initial_instance_capacity, stride) {
            Ok(instances) => instances,
            Err(err) => {
                targets.release(backend);
                constants.release(backend);
                return Err(err.into());
            }
        };

        log::info!(
            "Shadow system created: {} cascades {:?}",
            config.cascade_count,
            config.active_resolutions()
        );

        Ok(Self {
            cascades: vec![CascadeState::default(); config.cascade_count as usize],
            splits: Vec::new(),
            targets,
            constants,
            instances,
            staging: Vec::new(),
            pool,
            stats: FrameStats::default(),
            config,
        })
    }

    /// Apply a new configuration
    ///
    /// Depth targets are only recreated when the cascade count or a
    /// resolution changes. The new targets are fully acquired before the
    /// old ones are released; on failure the current configuration and
    /// resources are left untouched.
    pub fn reconfigure(&mut self, config: ShadowConfig, backend: &mut dyn ShadowBackend) -> Result<()> {
        let config = config.validated()?;

        let targets = if self.targets.matches(config.active_resolutions()) {
            None
        } else {
            Some(CascadeTargets::acquire(backend, config.active_resolutions())?)
        };

        if self.instances.capacity() < config.initial_instance_capacity {
            if let Err(err) = self.instances.ensure_capacity(
                backend,
                config.initial_instance_capacity as usize,
                config.instance_growth,
            ) {
                if let Some(targets) = targets {
                    targets.release(backend);
                }
                return Err(err.into());
            }
        }

        if let Some(targets) = targets {
            let old = std::mem::replace(&mut self.targets, targets);
            old.release(backend);
            // Fresh targets hold nothing worth sampling or clearing
            for state in &mut self.cascades {
                state.drawn = false;
                state.rendered_last_frame = false;
            }
            log::info!(
                "Shadow targets reallocated: {} cascades {:?}",
                config.cascade_count,
                config.active_resolutions()
            );
        }

        let count = config.cascade_count as usize;
        if count != self.cascades.len() {
            self.cascades.resize_with(count, CascadeState::default);
            self.splits.clear();
        }

        log::debug!("Shadow config applied: {:?}", config);
        self.config = config;
        Ok(())
    }

    /// Cull and fit every cascade for this frame
    ///
    /// Returns the total number of caster instances. Each call recomputes
    /// everything from its inputs; identical inputs give identical
    /// transforms.
    pub fn compute_cascades(
        &mut self,
        renderables: &[&dyn ShadowRenderable],
        camera: &dyn ShadowCamera,
        light: &LightShadowConfig,
        backend: &mut dyn ShadowBackend,
    ) -> Result<usize> {
        let count = self.cascades.len();
        let mut stats = FrameStats {
            instance_capacity: self.instances.capacity(),
            ..Default::default()
        };

        if !self.config.enabled {
            self.clear_casters();
            self.write_constants();
            self.stats = stats;
            return Ok(0);
        }

        let near = camera.near_plane();
        let far = camera
            .far_plane()
            .min(self.config.shadow_distance)
            .min(light.reach());
        if far.is_nan() || far <= near {
            log::debug!("Shadow range [{near}, {far}] is empty, no cascades this frame");
            self.splits.clear();
            self.clear_casters();
            self.write_constants();
            self.stats = stats;
            return Ok(0);
        }

        let candidates = snapshot(renderables);
        stats.candidates = candidates.len();
        self.splits = compute_splits(count as u32, near, far, self.config.cascade_lambda);

        let results = self.dispatch(&candidates, camera, light);
        self.apply_results(results, &mut stats);

        let total: usize = self.cascades.iter().map(|c| c.casters.len()).sum();
        stats.total_instances = total;

        match self
            .instances
            .ensure_capacity(backend, total, self.config.instance_growth)
        {
            Ok(grown) => stats.instance_buffer_grown = grown,
            Err(err) => {
                // Nothing may be drawn past the end of the old buffer
                self.clear_casters();
                self.stats = stats;
                return Err(err.into());
            }
        }
        stats.instance_capacity = self.instances.capacity();

        self.write_constants();
        self.stats = stats;
        Ok(total)
    }

    /// Run cull + fit for every cascade on the pool and wait for all of them
    fn dispatch(
        &self,
        candidates: &Arc<[Caster]>,
        camera: &dyn ShadowCamera,
        light: &LightShadowConfig,
    ) -> Vec<Option<CascadeFit>> {
        let light = *light;
        let light_view = light.view_matrix();
        let strategy = light.kind.strategy();
        let precise = self.config.precise_sweep;
        let candidates = Arc::clone(candidates);

        let slices: Vec<(Frustum, FitSettings)> = (0..self.cascades.len())
            .map(|index| {
                let frustum = camera.frustum(self.splits[index], self.splits[index + 1]);
                let settings = FitSettings {
                    near_plane: light.near_plane,
                    resolution: self.config.resolution(index),
                };
                (frustum, settings)
            })
            .collect();

        self.pool.run_indexed(slices.len(), move |index| {
            let (frustum, settings) = slices[index];
            if strategy.is_implemented() {
                let casters = strategy.find_casters(&candidates, &frustum, &light, precise);
                fit_cascade(&frustum, casters, &candidates, light_view, settings)
            } else {
                strategy.find_casters(&candidates, &frustum, &light, precise);
                CascadeFit::default()
            }
        })
    }

    /// Store the joined results; a missing result leaves its cascade empty
    fn apply_results(&mut self, results: Vec<Option<CascadeFit>>, stats: &mut FrameStats) {
        for (index, (state, result)) in self.cascades.iter_mut().zip(results).enumerate() {
            match result {
                Some(fit) => {
                    state.transform = fit.transform;
                    state.drawn = !fit.casters.is_empty();
                    state.corrected = fit.corrected;
                    state.casters = fit.casters;
                }
                None => {
                    log::warn!("{}", ShadowError::WorkerLost { cascade: index });
                    state.casters.clear();
                    state.drawn = false;
                    state.corrected = false;
                    stats.lost_cascades += 1;
                }
            }
            stats.casters_per_cascade[index] = state.casters.len();
            stats.drawn_cascades += state.drawn as usize;
            stats.corrected_cascades += state.corrected as usize;
            log::trace!(
                "Cascade {index}: {} casters, drawn {}, corrected {}",
                state.casters.len(),
                state.drawn,
                state.corrected
            );
        }
    }

    fn clear_casters(&mut self) {
        for state in &mut self.cascades {
            state.casters.clear();
            state.drawn = false;
            state.corrected = false;
        }
    }

    /// Stage the cascade constants for the next upload
    fn write_constants(&mut self) {
        let mut uniforms = GpuCascadeUniforms {
            cascade_count: self.cascades.len() as u32,
            sampling_radius: self.config.sampling_radius,
            sample_count: self.config.sample_count,
            ..Default::default()
        };
        for (index, state) in self.cascades.iter().enumerate().take(MAX_CASCADES) {
            uniforms.view_projections[index] = state.transform.view_projection.to_cols_array_2d();
            uniforms.splits[index] = self.splits.get(index + 1).copied().unwrap_or(0.0);
            let size = self.config.resolution(index) as f32;
            let texel = state.transform.texel_size;
            uniforms.texel_sizes[index] = [texel.x, texel.y, size, size];
            if state.drawn {
                uniforms.drawn_mask |= 1 << index;
            }
        }
        self.constants.write(uniforms);
    }

    /// Release every GPU resource
    pub fn release(self, backend: &mut dyn ShadowBackend) {
        let Self {
            targets,
            constants,
            instances,
            ..
        } = self;
        targets.release(backend);
        constants.release(backend);
        instances.release(backend);
        log::info!("Shadow system released");
    }

    // Light-facing accessors. Out-of-range cascades get identity matrices,
    // zero sizes and `false`.

    pub fn light_view_projection(&self, cascade: usize) -> Mat4 {
        self.cascade_transform(cascade).view_projection
    }

    pub fn light_view(&self, cascade: usize) -> Mat4 {
        self.cascade_transform(cascade).view
    }

    pub fn light_projection(&self, cascade: usize) -> Mat4 {
        self.cascade_transform(cascade).projection
    }

    pub fn cascade_transform(&self, cascade: usize) -> CascadeTransform {
        self.cascades
            .get(cascade)
            .map(|c| c.transform)
            .unwrap_or_default()
    }

    pub fn texel_size(&self, cascade: usize) -> Vec2 {
        self.cascade_transform(cascade).texel_size
    }

    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }

    /// Depth target size in texels
    pub fn shadow_map_size(&self, cascade: usize) -> u32 {
        self.targets.get(cascade).map_or(0, |t| t.size)
    }

    pub fn is_cascade_drawn(&self, cascade: usize) -> bool {
        self.cascades.get(cascade).is_some_and(|c| c.drawn)
    }

    /// Casters of one cascade from the last compute
    pub fn casters(&self, cascade: usize) -> &[Caster] {
        self.cascades
            .get(cascade)
            .map_or(&[], |c| c.casters.as_slice())
    }

    /// Bind a cascade's depth target for sampling; false if out of range
    pub fn bind_shadow_map_texture(&self, backend: &mut dyn ShadowBackend, slot: u32, cascade: usize) -> bool {
        match self.targets.get(cascade) {
            Some(target) => {
                backend.bind_shadow_map(target.handle, slot);
                true
            }
            None => false,
        }
    }

    /// Split distances of the last compute (`cascade_count + 1` entries)
    pub fn splits(&self) -> &[f32] {
        &self.splits
    }

    /// Constants as they will be after the next upload
    pub fn uniforms(&self) -> &GpuCascadeUniforms {
        self.constants.latest()
    }

    pub fn instance_capacity(&self) -> u32 {
        self.instances.capacity()
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}

impl std::fmt::Debug for ShadowSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowSystem")
            .field("config", &self.config)
            .field("cascades", &self.cascades.len())
            .field("splits", &self.splits)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Flatten the frame's renderables into shareable cull candidates
fn snapshot(renderables: &[&dyn ShadowRenderable]) -> Arc<[Caster]> {
    renderables
        .iter()
        .enumerate()
        .filter(|(_, r)| r.casts_shadows())
        .flat_map(|(index, r)| {
            (0..r.subset_count()).map(move |subset| Caster {
                renderable: index,
                subset,
                bounds: r.subset_bounds(subset),
            })
        })
        .filter(|c| !c.bounds.is_empty())
        .collect()
}
