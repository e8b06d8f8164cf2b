//! # penumbra_shadow - Cascaded Shadow Maps
//!
//! Culling, light-space fitting and depth pass submission for directional
//! light cascades. Per frame:
//!
//! 1. The camera range is split into cascades (practical split scheme).
//! 2. Each cascade runs on a worker: renderables are swept along the light
//!    direction against the cascade frustum to find casters, then an
//!    orthographic light projection is fitted and cropped around them.
//! 3. After a single join the shared instance buffer is grown if needed.
//! 4. Casters are packed into the instance buffer and drawn depth-only into
//!    each cascade's target.
//!
//! Depth uses reversed-Z: near maps to 1.0, far to 0.0.
//!
//! The GPU layer is abstracted behind [`ShadowBackend`]; the system only
//! holds handles.

pub mod backend;
pub mod config;
pub mod culler;
pub mod data;
pub mod error;
pub mod fit;
pub mod pool;
pub mod scene;
pub mod split;
pub mod submit;
pub mod system;

pub use backend::{
    BufferHandle, BufferUsage, CascadeTargets, DepthDraw, DepthTarget, DepthTargetHandle, InstanceBuffer,
    ShadowBackend, Viewport,
};
pub use config::{LightKind, LightShadowConfig, ShadowConfig, ShadowQuality};
pub use culler::{find_casters, Caster, CasterStrategy};
pub use data::{CascadeConstants, GpuCascadeUniforms, ShadowInstance};
pub use error::{BackendError, Result, ShadowError};
pub use fit::{fit_cascade, CascadeFit, CascadeTransform, FitSettings, REVERSE_Z};
pub use pool::CascadeWorkerPool;
pub use scene::{PerspectiveCamera, ShadowCamera, ShadowRenderable};
pub use split::{cascade_blend, cascade_for_depth, compute_splits};
pub use submit::{SubmitStats, CLEAR_DEPTH};
pub use system::{FrameStats, ShadowSystem};

/// Maximum supported cascade count
pub const MAX_CASCADES: usize = 4;

pub mod prelude {
    pub use crate::config::{LightShadowConfig, ShadowConfig, ShadowQuality};
    pub use crate::scene::{PerspectiveCamera, ShadowCamera, ShadowRenderable};
    pub use crate::system::ShadowSystem;
    pub use crate::{BufferHandle, ShadowBackend, ShadowInstance, MAX_CASCADES};
    pub use penumbra_math::prelude::*;
}
