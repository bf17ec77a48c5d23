//! Robot trajectory files (`.traj`).

use std::path::Path;

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::{Timestamp, Transform};

use super::error::FormatError;
use super::header::FileKind;

/// Trajectory file framing.
pub const TRAJECTORY_FILE: FileKind = FileKind {
    magic: *b"VTRJ",
    version: 1,
};

/// One timestamped pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StampedPose {
    /// Nanoseconds since the epoch
    pub timestamp_ns: u64,
    /// Position `[x, y, z]` in meters
    pub position: [f32; 3],
    /// Orientation quaternion `[w, x, y, z]`
    pub orientation: [f32; 4],
}

impl StampedPose {
    /// Capture a pose.
    pub fn new(timestamp: Timestamp, pose: &Transform) -> Self {
        let p = pose.position();
        let q = pose.rotation();
        Self {
            timestamp_ns: timestamp.as_nanos(),
            position: [p.x, p.y, p.z],
            orientation: [q.w, q.i, q.j, q.k],
        }
    }

    /// Stamp as a [`Timestamp`].
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_nanos(self.timestamp_ns)
    }

    /// Pose as a [`Transform`].
    pub fn transform(&self) -> Transform {
        let [w, x, y, z] = self.orientation;
        Transform::new(
            Vector3::from(self.position),
            UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        )
    }
}

/// Trajectory of one robot in one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFile {
    /// Robot that produced the poses
    pub robot_name: String,
    /// Frame the poses are expressed in
    pub frame_id: String,
    /// Poses in time order
    pub stamped_poses: Vec<StampedPose>,
}

impl TrajectoryFile {
    /// Empty trajectory.
    pub fn new(robot_name: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            robot_name: robot_name.into(),
            frame_id: frame_id.into(),
            stamped_poses: Vec::new(),
        }
    }

    /// Write to disk.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        TRAJECTORY_FILE.save(path, self)
    }

    /// Read from disk.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        TRAJECTORY_FILE.load(path)
    }
}
