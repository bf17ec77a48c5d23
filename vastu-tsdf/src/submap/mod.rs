//! Segmentation of a long mission into submaps.
//!
//! A submap is finished once the sensor has moved or aged past a bound since
//! the previous boundary. Finishing emits the map plus the trajectory of the
//! live window, optionally writes both to disk, and then either wipes the
//! map or keeps fusing if deintegration already bounds it.

use crate::config::SubmapConfig;
use crate::core::{Point, Threshold, Timestamp, Transform};
use crate::io::{LayerMessage, StampedPose, TrajectoryFile};
use crate::window::DeintegrationWindow;

/// Bounds that end the current submap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SubmapThresholds {
    /// Seconds since the previous boundary
    pub max_time_interval: Threshold<f64>,
    /// Meters from the previous boundary
    pub max_distance_travelled: Threshold<f32>,
}

impl SubmapThresholds {
    /// Validate raw configuration. Non-positive values are logged and left unset.
    pub fn from_config(config: &SubmapConfig) -> Self {
        Self {
            max_time_interval: Threshold::from_validated(
                "submap.max_time_interval",
                config.max_time_interval,
                |v| v > 0.0,
                "positive",
            ),
            max_distance_travelled: Threshold::from_validated(
                "submap.max_distance_travelled",
                config.max_distance_travelled,
                |v| v > 0.0,
                "positive",
            ),
        }
    }

    /// True if either bound is set.
    pub fn any_set(&self) -> bool {
        self.max_time_interval.is_set() || self.max_distance_travelled.is_set()
    }
}

/// Boundary bookkeeping for the active submap.
#[derive(Clone, Debug)]
pub struct SubmapLifecycle {
    thresholds: SubmapThresholds,
    counter: u32,
    reference_timestamp: Timestamp,
    reference_position: Point,
}

impl SubmapLifecycle {
    /// Start before the first observation.
    pub fn new(thresholds: SubmapThresholds) -> Self {
        Self {
            thresholds,
            counter: 0,
            reference_timestamp: Timestamp::ZERO,
            reference_position: Point::repeat(f32::NAN),
        }
    }

    /// Whether submapping is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.thresholds.any_set()
    }

    /// Active thresholds.
    pub fn thresholds(&self) -> &SubmapThresholds {
        &self.thresholds
    }

    /// Index of the submap currently being built.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Stamp of the previous boundary (zero before the first sample).
    pub fn reference_timestamp(&self) -> Timestamp {
        self.reference_timestamp
    }

    /// Position of the previous boundary (NaN before the first sample).
    pub fn reference_position(&self) -> Point {
        self.reference_position
    }

    fn is_initialized(&self) -> bool {
        !self.reference_timestamp.is_zero() && !self.reference_position.iter().any(|v| v.is_nan())
    }

    fn set_reference(&mut self, timestamp: Timestamp, pose: &Transform) {
        self.reference_timestamp = timestamp;
        self.reference_position = pose.position();
    }

    /// Whether the current submap is done at this observation.
    ///
    /// The first sample only initializes the reference and never finishes a
    /// submap.
    pub fn should_finalize(&mut self, timestamp: Timestamp, pose: &Transform) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if !self.is_initialized() {
            self.set_reference(timestamp, pose);
            return false;
        }

        let elapsed = timestamp.seconds_since(self.reference_timestamp);
        let travelled = (pose.position() - self.reference_position).norm();
        self.thresholds.max_time_interval.is_set_and_less_than(elapsed)
            || self.thresholds.max_distance_travelled.is_set_and_less_than(travelled)
    }

    /// Move on to the next submap starting at this observation.
    pub fn begin_next(&mut self, timestamp: Timestamp, pose: &Transform) {
        self.counter += 1;
        self.set_reference(timestamp, pose);
    }
}

/// A finished submap as published to consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmapBundle {
    /// Submap index
    pub index: u32,
    /// Robot that built it
    pub robot_name: String,
    /// Full map snapshot
    pub layer: LayerMessage,
    /// Poses of the clouds live in the map
    pub trajectory: TrajectoryFile,
}

/// Trajectory of every packet in the window, oldest first.
pub fn window_trajectory(window: &DeintegrationWindow, robot_name: &str, frame_id: &str) -> TrajectoryFile {
    let mut trajectory = TrajectoryFile::new(robot_name, frame_id);
    trajectory.stamped_poses = window
        .iter()
        .map(|packet| StampedPose::new(packet.timestamp(), &packet.pose))
        .collect();
    trajectory
}
