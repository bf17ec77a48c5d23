//! Pose refinement against the map.
//!
//! [`PoseRefiner`] keeps a persistent correction offset between the prior
//! poses coming from the resolver and the poses the aligner settles on:
//!
//! ```text
//! effective prior = correction ∘ prior
//! refined         = align(map, points, effective prior)
//! correction      = refined ∘ prior⁻¹
//! ```

mod icp;

pub use icp::TsdfIcp;

use crate::core::{Pointcloud, Timestamp, Transform};
use crate::tsdf::TsdfLayer;

/// Aligns a sensor cloud against the map starting from a prior.
pub trait PoseAligner: Send {
    /// Returns the refined pose and the number of successful update steps.
    fn align(&mut self, layer: &TsdfLayer, points: &Pointcloud, prior: &Transform) -> (Transform, usize);

    /// Whether roll and pitch are solved for. If not, only x, y, z and yaw move.
    fn refines_roll_pitch(&self) -> bool;
}

/// Result of one refinement, published for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RefinementUpdate {
    /// Stamp of the refined cloud
    pub timestamp: Timestamp,
    /// Pose from the resolver, before correction
    pub raw_pose: Transform,
    /// Pose after alignment
    pub refined_pose: Transform,
    /// Correction offset after this call
    pub correction: Transform,
    /// Successful aligner steps
    pub update_count: usize,
}

/// Refines resolver poses and tracks the accumulated correction.
#[derive(Debug)]
pub struct PoseRefiner<A = TsdfIcp> {
    aligner: A,
    accumulate_corrections: bool,
    correction: Transform,
}

impl<A: PoseAligner> PoseRefiner<A> {
    /// Create a refiner around an aligner.
    pub fn new(aligner: A, accumulate_corrections: bool) -> Self {
        Self {
            aligner,
            accumulate_corrections,
            correction: Transform::identity(),
        }
    }

    /// Current correction offset.
    pub fn correction(&self) -> Transform {
        self.correction
    }

    /// Whether the correction carries over between calls.
    pub fn accumulates_corrections(&self) -> bool {
        self.accumulate_corrections
    }

    /// The wrapped aligner.
    pub fn aligner(&self) -> &A {
        &self.aligner
    }

    /// Refine `prior` for a cloud stamped `timestamp`.
    pub fn refine(
        &mut self,
        timestamp: Timestamp,
        prior: &Transform,
        points: &Pointcloud,
        layer: &TsdfLayer,
    ) -> RefinementUpdate {
        if !self.accumulate_corrections {
            self.correction = Transform::identity();
        }

        let effective_prior = self.correction * *prior;
        let (refined, update_count) = self.aligner.align(layer, points, &effective_prior);
        self.correction = refined * prior.inverse();

        if !self.aligner.refines_roll_pitch() {
            // The aligner never moves roll/pitch, zero them so rounding
            // does not accumulate on unconstrained axes.
            let mut v = self.correction.log();
            v[3] = 0.0;
            v[4] = 0.0;
            self.correction = Transform::exp(&v);
        }

        RefinementUpdate {
            timestamp,
            raw_pose: *prior,
            refined_pose: refined,
            correction: self.correction,
            update_count,
        }
    }
}
