//! Pose lookup by frame and timestamp.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::core::{Timestamp, Transform};

/// Resolves `T_G_C` for a sensor frame at a given time.
///
/// `None` means "not available yet". Callers keep the message and retry
/// on the next drain.
pub trait PoseResolver {
    /// Pose of `frame_id` expressed in `world_frame` at `timestamp`.
    fn lookup(&self, frame_id: &str, world_frame: &str, timestamp: Timestamp) -> Option<Transform>;
}

/// Stamped pose history per frame with interpolation.
///
/// Poses are assumed to be expressed in the world frame. Queries between two
/// stored samples are interpolated; queries after the newest sample are not
/// answered until a newer sample arrives.
#[derive(Clone, Debug)]
pub struct TransformBuffer {
    horizon_nanos: u64,
    dynamic: HashMap<String, BTreeMap<Timestamp, Transform>>,
    fixed: HashMap<String, Transform>,
}

impl TransformBuffer {
    /// Create a buffer that keeps `horizon_secs` of history per frame.
    pub fn new(horizon_secs: f64) -> Self {
        Self {
            horizon_nanos: (horizon_secs.max(0.0) * 1e9) as u64,
            dynamic: HashMap::new(),
            fixed: HashMap::new(),
        }
    }

    /// Record a stamped pose and drop samples older than the horizon.
    pub fn insert(&mut self, frame_id: &str, timestamp: Timestamp, pose: Transform) {
        let history = self.dynamic.entry(frame_id.to_string()).or_default();
        history.insert(timestamp, pose);

        let newest = history.last_key_value().map(|(t, _)| *t);
        if let Some(newest) = newest {
            let cutoff = Timestamp::from_nanos(newest.as_nanos().saturating_sub(self.horizon_nanos));
            // Keep one sample at or before the cutoff so queries near it can interpolate.
            let keep_from = history.range(..=cutoff).next_back().map(|(t, _)| *t);
            if let Some(keep_from) = keep_from {
                *history = history.split_off(&keep_from);
            }
        }
    }

    /// Register a frame whose pose never changes.
    pub fn set_fixed(&mut self, frame_id: &str, pose: Transform) {
        self.fixed.insert(frame_id.to_string(), pose);
    }

    /// Number of stored samples for a frame.
    pub fn len(&self, frame_id: &str) -> usize {
        self.dynamic.get(frame_id).map_or(0, BTreeMap::len)
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.dynamic.values().all(BTreeMap::is_empty) && self.fixed.is_empty()
    }
}

impl PoseResolver for TransformBuffer {
    fn lookup(&self, frame_id: &str, world_frame: &str, timestamp: Timestamp) -> Option<Transform> {
        if frame_id == world_frame {
            return Some(Transform::identity());
        }
        if let Some(pose) = self.fixed.get(frame_id) {
            return Some(*pose);
        }

        let history = self.dynamic.get(frame_id)?;
        let (&before_t, before) = history.range(..=timestamp).next_back()?;
        if before_t == timestamp {
            return Some(*before);
        }
        let (&after_t, after) = history
            .range((Bound::Excluded(timestamp), Bound::Unbounded))
            .next()?;

        let span = after_t.seconds_since(before_t);
        let t = (timestamp.seconds_since(before_t) / span) as f32;
        Some(before.interpolate(after, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;
    use approx::assert_relative_eq;

    fn secs(s: f64) -> Timestamp {
        Timestamp::from_secs_f64(s)
    }

    #[test]
    fn test_interpolates_between_samples() {
        let mut buffer = TransformBuffer::new(10.0);
        buffer.insert("lidar", secs(1.0), Transform::from_translation(Point::new(0.0, 0.0, 0.0)));
        buffer.insert("lidar", secs(2.0), Transform::from_translation(Point::new(2.0, 0.0, 0.0)));

        let pose = buffer.lookup("lidar", "world", secs(1.25)).unwrap();
        assert_relative_eq!(pose.position(), Point::new(0.5, 0.0, 0.0), epsilon = 1e-5);
        let exact = buffer.lookup("lidar", "world", secs(2.0)).unwrap();
        assert_relative_eq!(exact.position(), Point::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_not_ready_outside_range() {
        let mut buffer = TransformBuffer::new(10.0);
        buffer.insert("lidar", secs(1.0), Transform::identity());
        buffer.insert("lidar", secs(2.0), Transform::identity());
        assert!(buffer.lookup("lidar", "world", secs(2.5)).is_none());
        assert!(buffer.lookup("lidar", "world", secs(0.5)).is_none());
        assert!(buffer.lookup("camera", "world", secs(1.5)).is_none());
    }

    #[test]
    fn test_world_and_fixed_frames() {
        let mut buffer = TransformBuffer::new(10.0);
        assert!(buffer.lookup("world", "world", secs(3.0)).is_some());
        buffer.set_fixed("base", Transform::from_translation(Point::new(0.0, 0.0, 1.0)));
        let pose = buffer.lookup("base", "world", secs(100.0)).unwrap();
        assert_relative_eq!(pose.position().z, 1.0);
    }

    #[test]
    fn test_horizon_drops_old_samples() {
        let mut buffer = TransformBuffer::new(1.0);
        for i in 0..10 {
            buffer.insert("lidar", secs(1.0 + i as f64 * 0.5), Transform::identity());
        }
        // Newest is 5.5s, cutoff 4.5s: keeps 4.5, 5.0 and 5.5.
        assert_eq!(buffer.len("lidar"), 3);
        assert!(buffer.lookup("lidar", "world", secs(4.75)).is_some());
        assert!(buffer.lookup("lidar", "world", secs(2.0)).is_none());
    }
}
