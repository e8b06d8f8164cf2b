//! Shadow Configuration
//!
//! Global cascade settings and per-light shadow parameters, with serde
//! support for hot-reload.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowError};
use crate::MAX_CASCADES;

/// Global cascaded shadow configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Enable shadows globally
    pub enabled: bool,

    /// Number of cascades (1-4)
    pub cascade_count: u32,

    /// Cascade split lambda (0 = uniform, 1 = logarithmic)
    pub cascade_lambda: f32,

    /// Sweep against the exact cascade frustum instead of its bounding box
    pub precise_sweep: bool,

    /// Depth target resolution per cascade (power of 2)
    pub cascade_resolutions: [u32; MAX_CASCADES],

    /// Maximum shadow distance from camera
    pub shadow_distance: f32,

    /// Filter radius in texels, forwarded to the sampling shader
    pub sampling_radius: f32,

    /// Filter tap count, forwarded to the sampling shader
    pub sample_count: u32,

    /// Instance slots allocated up front
    pub initial_instance_capacity: u32,

    /// Slots added each time the instance buffer runs out
    pub instance_growth: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cascade_count: 4,
            cascade_lambda: 0.5,
            precise_sweep: true,
            cascade_resolutions: [2048; MAX_CASCADES],
            shadow_distance: 100.0,
            sampling_radius: 1.5,
            sample_count: 16,
            initial_instance_capacity: 1024,
            instance_growth: 512,
        }
    }
}

impl ShadowConfig {
    /// Create a high-quality shadow configuration
    pub fn high_quality() -> Self {
        Self {
            cascade_lambda: 0.75,
            cascade_resolutions: [4096, 4096, 2048, 2048],
            sampling_radius: 2.0,
            sample_count: 32,
            shadow_distance: 150.0,
            ..Default::default()
        }
    }

    /// Create a low-quality shadow configuration for performance
    pub fn low_quality() -> Self {
        Self {
            cascade_count: 2,
            precise_sweep: false,
            cascade_resolutions: [1024; MAX_CASCADES],
            shadow_distance: 50.0,
            sampling_radius: 1.0,
            sample_count: 4,
            ..Default::default()
        }
    }

    /// Create a configuration with shadows disabled
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Validate configuration and clamp values to valid ranges
    pub fn validate(&mut self) {
        self.cascade_count = self.cascade_count.clamp(1, MAX_CASCADES as u32);
        self.cascade_lambda = self.cascade_lambda.clamp(0.0, 1.0);
        for resolution in &mut self.cascade_resolutions {
            *resolution = (*resolution).clamp(256, 8192).next_power_of_two();
        }
        self.shadow_distance = self.shadow_distance.max(1.0);
        self.sampling_radius = self.sampling_radius.clamp(0.0, 16.0);
        self.sample_count = self.sample_count.clamp(1, 64);
        self.initial_instance_capacity = self.initial_instance_capacity.max(1);
        self.instance_growth = self.instance_growth.max(1);
    }

    /// Clamp, then reject anything clamping cannot repair (NaN)
    pub fn validated(mut self) -> Result<Self> {
        self.validate();
        let floats = [
            ("cascade_lambda", self.cascade_lambda),
            ("shadow_distance", self.shadow_distance),
            ("sampling_radius", self.sampling_radius),
        ];
        for (name, value) in floats {
            if value.is_nan() {
                return Err(ShadowError::InvalidConfig(format!("{name} is NaN")));
            }
        }
        Ok(self)
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolutions of the active cascades
    pub fn active_resolutions(&self) -> &[u32] {
        let count = (self.cascade_count as usize).min(MAX_CASCADES);
        &self.cascade_resolutions[..count]
    }

    /// Resolution of one cascade (0 if out of range)
    pub fn resolution(&self, cascade: usize) -> u32 {
        self.active_resolutions().get(cascade).copied().unwrap_or(0)
    }
}

/// Shadow quality preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowQuality {
    /// No shadows
    Off,
    /// Two cascades, bounding-box sweep
    Low,
    /// Balanced quality and performance
    Medium,
    /// High quality shadows
    High,
    /// Maximum resolution and filtering
    Ultra,
}

impl ShadowQuality {
    /// Convert to a ShadowConfig
    pub fn to_config(self) -> ShadowConfig {
        match self {
            Self::Off => ShadowConfig::disabled(),
            Self::Low => ShadowConfig::low_quality(),
            Self::Medium => ShadowConfig::default(),
            Self::High => ShadowConfig::high_quality(),
            Self::Ultra => ShadowConfig {
                cascade_lambda: 0.8,
                cascade_resolutions: [8192, 4096, 4096, 2048],
                sampling_radius: 2.5,
                sample_count: 64,
                shadow_distance: 200.0,
                ..Default::default()
            },
        }
    }
}

/// Light type, which decides how casters are found
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    /// Cone half-angle in radians
    Spot { cone_half_angle: f32 },
    Point,
}

/// Per-light shadow parameters, immutable for one computation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightShadowConfig {
    pub kind: LightKind,

    /// Direction the light travels (unit)
    pub direction: Vec3,

    /// Up hint for the light view (unit, not parallel to direction)
    pub up: Vec3,

    /// Near plane for the light projection
    pub near_plane: f32,

    /// Light reach (None = unbounded)
    pub far_plane: Option<f32>,
}

impl Default for LightShadowConfig {
    fn default() -> Self {
        Self::directional(Vec3::new(0.0, -1.0, 0.0))
    }
}

impl LightShadowConfig {
    /// Create settings for a directional light travelling along `direction`
    pub fn directional(direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or_zero(),
            up: Vec3::Y,
            near_plane: 0.1,
            far_plane: None,
        }
    }

    /// Create settings for a spot light
    pub fn spot(direction: Vec3, cone_half_angle: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Spot { cone_half_angle },
            far_plane: Some(range),
            ..Self::directional(direction)
        }
    }

    /// Create settings for a point light
    pub fn point(range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            near_plane: 0.05,
            far_plane: Some(range),
            ..Self::default()
        }
    }

    /// Set the up hint
    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up.normalize_or_zero();
        self
    }

    /// Set the near plane
    pub fn with_near_plane(mut self, near_plane: f32) -> Self {
        self.near_plane = near_plane;
        self
    }

    /// Distance the light reaches from the camera's point of view
    pub fn reach(&self) -> f32 {
        self.far_plane.unwrap_or(f32::INFINITY)
    }

    /// Light view matrix positioned at the origin
    ///
    /// Falls back to a different up axis when `up` is parallel to the
    /// direction.
    pub fn view_matrix(&self) -> Mat4 {
        let direction = self.direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            log::warn!("Light direction is zero, using -Y");
            return Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Y, Vec3::Z);
        }
        let mut up = self.up.normalize_or_zero();
        if direction.cross(up).length_squared() < 1e-6 {
            let fallback = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
            log::warn!(
                "Light up {:?} is parallel to direction {:?}, using {:?}",
                self.up,
                direction,
                fallback
            );
            up = fallback;
        }
        Mat4::look_to_rh(Vec3::ZERO, direction, up)
    }
}
