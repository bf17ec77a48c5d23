//! Point-to-TSDF ICP.
//!
//! Aligns a sensor cloud against the distance field directly: every point
//! should land on the zero crossing, so its interpolated distance is the
//! residual and the field gradient gives the surface normal.
//!
//! ```text
//! r_i = D(T·p_i)          J_i = [ ∇Dᵀ , ((T·p_i) × ∇D)ᵀ ]
//! (Σ JᵀJ + Λ) δ = −Σ Jᵀ r          T ← exp(δ) · T
//! ```
//!
//! `Λ` damps the step toward the prior. Without roll/pitch refinement the
//! corresponding rows are pinned so the solution stays in x, y, z, yaw.

use nalgebra::{Matrix6, Vector6};

use crate::config::IcpConfig;
use crate::core::{Pointcloud, Transform};
use crate::tsdf::TsdfLayer;

use super::PoseAligner;

/// Gradients weaker than this are flat (saturated) regions of the field.
const MIN_GRADIENT_NORM: f32 = 0.5;

/// ICP against the TSDF.
#[derive(Clone, Debug)]
pub struct TsdfIcp {
    config: IcpConfig,
}

impl TsdfIcp {
    /// Create with the given parameters.
    pub fn new(config: IcpConfig) -> Self {
        Self { config }
    }

    /// Solver parameters.
    pub fn config(&self) -> &IcpConfig {
        &self.config
    }

    fn stride(&self) -> usize {
        (1.0 / self.config.subsample_keep_ratio).round().max(1.0) as usize
    }

    /// Build the normal equations at `pose`. Returns `None` if too few points match.
    fn build_system(
        &self,
        layer: &TsdfLayer,
        points: &Pointcloud,
        pose: &Transform,
    ) -> Option<(Matrix6<f32>, Vector6<f32>)> {
        let mut h = Matrix6::zeros();
        let mut b = Vector6::zeros();
        let mut used = 0usize;
        let mut matched = 0usize;

        for point_c in points.iter().step_by(self.stride()) {
            used += 1;
            let point_g = pose.transform_point(point_c);
            let Some(distance) = layer.interpolate_distance(&point_g, self.config.min_voxel_weight) else {
                continue;
            };
            let Some(gradient) = layer.distance_gradient(&point_g, self.config.min_voxel_weight) else {
                continue;
            };
            if gradient.norm() < MIN_GRADIENT_NORM {
                continue;
            }
            matched += 1;

            let moment = point_g.cross(&gradient);
            let jacobian = Vector6::new(
                gradient.x, gradient.y, gradient.z, moment.x, moment.y, moment.z,
            );
            h += jacobian * jacobian.transpose();
            b += jacobian * distance;
        }

        if used == 0 || (matched as f32) < self.config.min_match_ratio * used as f32 {
            log::debug!("ICP: only {} of {} points matched the map", matched, used);
            return None;
        }

        for i in 0..3 {
            h[(i, i)] += self.config.translation_weighting;
            h[(i + 3, i + 3)] += self.config.rotation_weighting;
        }
        if !self.config.refine_roll_pitch {
            for axis in [3, 4] {
                for k in 0..6 {
                    h[(axis, k)] = 0.0;
                    h[(k, axis)] = 0.0;
                }
                h[(axis, axis)] = 1.0;
                b[axis] = 0.0;
            }
        }
        Some((h, b))
    }
}

impl PoseAligner for TsdfIcp {
    fn align(&mut self, layer: &TsdfLayer, points: &Pointcloud, prior: &Transform) -> (Transform, usize) {
        let mut pose = *prior;
        let mut updates = 0;

        for _ in 0..self.config.max_iterations {
            let Some((h, b)) = self.build_system(layer, points, &pose) else {
                break;
            };
            let Some(cholesky) = h.cholesky() else {
                break;
            };
            let delta = -cholesky.solve(&b);
            if !delta.iter().all(|v| v.is_finite()) {
                break;
            }
            pose = Transform::exp(&delta) * pose;
            updates += 1;
            if delta.norm() < self.config.convergence_epsilon {
                break;
            }
        }
        (pose, updates)
    }

    fn refines_roll_pitch(&self) -> bool {
        self.config.refine_roll_pitch
    }
}
