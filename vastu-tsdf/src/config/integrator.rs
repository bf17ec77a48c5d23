//! Fusion engine settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use super::defaults;

/// Ray-casting fusion parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Engine name: "simple" or "merged"
    #[serde(default = "defaults::integrator_method")]
    pub method: String,

    /// Truncation band around the surface (meters)
    #[serde(default = "defaults::truncation_distance")]
    pub truncation_distance: f32,

    /// Voxel weight cap
    #[serde(default = "defaults::max_weight")]
    pub max_weight: f32,

    /// Clear all voxels between the sensor and the surface
    #[serde(default = "defaults::enabled")]
    pub voxel_carving_enabled: bool,

    /// Points closer than this are ignored (meters)
    #[serde(default = "defaults::min_ray_length")]
    pub min_ray_length_m: f32,

    /// Points farther than this only clear space (meters)
    #[serde(default = "defaults::max_ray_length")]
    pub max_ray_length_m: f32,

    /// Use weight 1 for every measurement instead of 1/r²
    #[serde(default)]
    pub use_const_weight: bool,

    /// Fade weights linearly behind the surface
    #[serde(default = "defaults::enabled")]
    pub use_weight_dropoff: bool,

    /// Allow points beyond the max ray length to clear space
    #[serde(default = "defaults::enabled")]
    pub allow_clear: bool,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            method: defaults::integrator_method(),
            truncation_distance: defaults::truncation_distance(),
            max_weight: defaults::max_weight(),
            voxel_carving_enabled: defaults::enabled(),
            min_ray_length_m: defaults::min_ray_length(),
            max_ray_length_m: defaults::max_ray_length(),
            use_const_weight: false,
            use_weight_dropoff: defaults::enabled(),
            allow_clear: defaults::enabled(),
        }
    }
}

impl IntegratorConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.truncation_distance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "truncation_distance must be positive, got {}",
                self.truncation_distance
            )));
        }
        if !(self.max_ray_length_m > self.min_ray_length_m) {
            return Err(ConfigError::Invalid(format!(
                "max_ray_length_m ({}) must exceed min_ray_length_m ({})",
                self.max_ray_length_m, self.min_ray_length_m
            )));
        }
        if !(self.max_weight > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_weight must be positive, got {}",
                self.max_weight
            )));
        }
        Ok(())
    }
}
