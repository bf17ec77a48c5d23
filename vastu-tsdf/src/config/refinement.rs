//! Pose refinement settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use super::defaults;

/// Whether and how incoming poses are refined against the map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Run ICP against the map before fusing each cloud
    #[serde(default)]
    pub enable_pose_refinement: bool,

    /// Carry the correction offset from one cloud to the next
    #[serde(default = "defaults::enabled")]
    pub accumulate_refinement_corrections: bool,

    /// Solver parameters
    #[serde(default)]
    pub icp: IcpConfig,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enable_pose_refinement: false,
            accumulate_refinement_corrections: defaults::enabled(),
            icp: IcpConfig::default(),
        }
    }
}

/// Point-to-TSDF ICP solver parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IcpConfig {
    /// Maximum Gauss-Newton iterations
    #[serde(default = "defaults::icp_iterations")]
    pub max_iterations: usize,

    /// Fraction of used points that must hit observed voxels for a step
    #[serde(default = "defaults::icp_min_match_ratio")]
    pub min_match_ratio: f32,

    /// Fraction of input points used (evenly strided)
    #[serde(default = "defaults::icp_subsample_keep_ratio")]
    pub subsample_keep_ratio: f32,

    /// Solve roll and pitch too (6-DoF instead of x, y, z, yaw)
    #[serde(default)]
    pub refine_roll_pitch: bool,

    /// Damping on translation, pulls the solution toward the prior
    #[serde(default = "defaults::icp_prior_weighting")]
    pub translation_weighting: f32,

    /// Damping on rotation, pulls the solution toward the prior
    #[serde(default = "defaults::icp_prior_weighting")]
    pub rotation_weighting: f32,

    /// Voxels at or below this weight are treated as unobserved
    #[serde(default = "defaults::icp_min_voxel_weight")]
    pub min_voxel_weight: f32,

    /// Stop once the update norm drops below this
    #[serde(default = "defaults::icp_convergence_epsilon")]
    pub convergence_epsilon: f32,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: defaults::icp_iterations(),
            min_match_ratio: defaults::icp_min_match_ratio(),
            subsample_keep_ratio: defaults::icp_subsample_keep_ratio(),
            refine_roll_pitch: false,
            translation_weighting: defaults::icp_prior_weighting(),
            rotation_weighting: defaults::icp_prior_weighting(),
            min_voxel_weight: defaults::icp_min_voxel_weight(),
            convergence_epsilon: defaults::icp_convergence_epsilon(),
        }
    }
}

impl IcpConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.subsample_keep_ratio > 0.0 && self.subsample_keep_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "icp.subsample_keep_ratio must be in (0, 1], got {}",
                self.subsample_keep_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.min_match_ratio) {
            return Err(ConfigError::Invalid(format!(
                "icp.min_match_ratio must be in [0, 1], got {}",
                self.min_match_ratio
            )));
        }
        Ok(())
    }
}
