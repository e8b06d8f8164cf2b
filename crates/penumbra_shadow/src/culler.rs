//! Caster culling per cascade
//!
//! A renderable casts into a cascade when its bounds, pushed along the
//! light's travel direction, meet the cascade's frustum slice. Each light
//! kind supplies a [`CasterStrategy`]; only directional lights are
//! implemented, the others report no casters.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use penumbra_math::{sweep_intersects, Frustum, AABB};

use crate::config::{LightKind, LightShadowConfig};

/// A renderable subset found to cast into a cascade
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Caster {
    /// Index into the frame's renderable slice
    pub renderable: usize,
    pub subset: u32,
    /// World-space bounds
    pub bounds: AABB,
}

/// Finds the casters of one cascade
pub trait CasterStrategy: Send + Sync {
    fn find_casters(
        &self,
        candidates: &[Caster],
        frustum: &Frustum,
        light: &LightShadowConfig,
        precise: bool,
    ) -> Vec<Caster>;

    /// False for light kinds without cascade support
    fn is_implemented(&self) -> bool {
        true
    }
}

/// Sweep every candidate along a directional light
pub struct DirectionalCasters;

impl CasterStrategy for DirectionalCasters {
    fn find_casters(
        &self,
        candidates: &[Caster],
        frustum: &Frustum,
        light: &LightShadowConfig,
        precise: bool,
    ) -> Vec<Caster> {
        find_casters(candidates, frustum, light.direction, precise)
    }
}

/// Light kinds that do not cast cascaded shadows
pub struct UnsupportedCasters {
    name: &'static str,
    reported: AtomicBool,
}

impl UnsupportedCasters {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            reported: AtomicBool::new(false),
        }
    }
}

impl CasterStrategy for UnsupportedCasters {
    fn find_casters(&self, _: &[Caster], _: &Frustum, _: &LightShadowConfig, _: bool) -> Vec<Caster> {
        if !self.reported.swap(true, Ordering::Relaxed) {
            log::debug!("{} light shadows are not implemented, no casters", self.name);
        }
        Vec::new()
    }

    fn is_implemented(&self) -> bool {
        false
    }
}

static DIRECTIONAL: DirectionalCasters = DirectionalCasters;
static SPOT: UnsupportedCasters = UnsupportedCasters::new("Spot");
static POINT: UnsupportedCasters = UnsupportedCasters::new("Point");

impl LightKind {
    /// Caster strategy for this light kind
    pub fn strategy(&self) -> &'static dyn CasterStrategy {
        match self {
            Self::Directional => &DIRECTIONAL,
            Self::Spot { .. } => &SPOT,
            Self::Point => &POINT,
        }
    }
}

/// Every candidate whose bounds, swept along `direction`, meet `frustum`
///
/// With `precise == false` the test runs against the frustum's bounding
/// box, which is cheaper and returns a superset. Candidate order is kept.
pub fn find_casters(candidates: &[Caster], frustum: &Frustum, direction: Vec3, precise: bool) -> Vec<Caster> {
    let bounds_frustum;
    let target = if precise {
        frustum
    } else {
        bounds_frustum = Frustum::from_aabb(&frustum.aabb());
        &bounds_frustum
    };

    candidates
        .iter()
        .filter(|candidate| sweep_intersects(&candidate.bounds, target, direction))
        .copied()
        .collect()
}
