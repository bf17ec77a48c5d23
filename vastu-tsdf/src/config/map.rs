//! Map geometry and mesh extraction settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use super::defaults;

/// Voxel grid layout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapConfig {
    /// Voxel edge length in meters
    #[serde(default = "defaults::voxel_size")]
    pub voxel_size: f32,

    /// Voxels along each edge of a block
    #[serde(default = "defaults::voxels_per_side")]
    pub voxels_per_side: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            voxel_size: defaults::voxel_size(),
            voxels_per_side: defaults::voxels_per_side(),
        }
    }
}

impl MapConfig {
    /// Block edge length in meters.
    pub fn block_size(&self) -> f32 {
        self.voxel_size * self.voxels_per_side as f32
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.voxel_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "voxel_size must be positive, got {}",
                self.voxel_size
            )));
        }
        if self.voxels_per_side == 0 {
            return Err(ConfigError::Invalid(
                "voxels_per_side must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Mesh extraction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Voxels at or below this weight are not meshed
    #[serde(default = "defaults::mesh_min_weight")]
    pub min_weight: f32,

    /// Surface band as a fraction of the voxel size
    #[serde(default = "defaults::surface_distance_factor")]
    pub surface_distance_factor: f32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            min_weight: defaults::mesh_min_weight(),
            surface_distance_factor: defaults::surface_distance_factor(),
        }
    }
}
