//! A point cloud ready for fusion.

use std::sync::Arc;

use super::{Colors, Pointcloud, SharedColors, SharedPointcloud, Timestamp};

/// A converted point cloud with immutable shared buffers.
///
/// The same buffers are handed to the forward fusion call and kept by the
/// deintegration window, so cloning an `Observation` never copies points.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Acquisition time
    pub timestamp: Timestamp,
    /// Points in the sensor frame
    pub points: SharedPointcloud,
    /// One color per point
    pub colors: SharedColors,
    /// Freespace clouds only clear space beyond the truncation band
    pub is_freespace: bool,
}

impl Observation {
    /// Wrap owned buffers.
    ///
    /// # Panics
    ///
    /// Panics if `points` and `colors` have different lengths.
    pub fn new(timestamp: Timestamp, points: Pointcloud, colors: Colors, is_freespace: bool) -> Self {
        Self::from_shared(timestamp, Arc::new(points), Arc::new(colors), is_freespace)
    }

    /// Wrap already shared buffers.
    ///
    /// # Panics
    ///
    /// Panics if `points` and `colors` have different lengths.
    pub fn from_shared(
        timestamp: Timestamp,
        points: SharedPointcloud,
        colors: SharedColors,
        is_freespace: bool,
    ) -> Self {
        assert_eq!(
            points.len(),
            colors.len(),
            "point cloud has {} points but {} colors",
            points.len(),
            colors.len()
        );
        Self {
            timestamp,
            points,
            colors,
            is_freespace,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
