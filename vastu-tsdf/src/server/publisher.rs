//! Output sink for everything the server produces.

use std::path::Path;

use crate::core::{Point, Pointcloud, Timestamp};
use crate::io::LayerMessage;
use crate::refine::RefinementUpdate;
use crate::submap::SubmapBundle;
use crate::tsdf::MeshMessage;
use crate::tsdf::visualization::{ColoredPoint, IntensityPoint};

/// Receives server outputs.
///
/// Every method has a no-op default so sinks only implement what they
/// consume. Subscriber counts gate the expensive outputs: a map snapshot is
/// only serialized when someone listens for it.
pub trait MapPublisher: Send {
    /// Listeners on the map stream.
    fn num_map_subscribers(&self) -> usize {
        0
    }

    /// Listeners on the submap stream.
    fn num_submap_subscribers(&self) -> usize {
        0
    }

    /// Listeners on the reprojected cloud stream.
    fn num_reprojected_subscribers(&self) -> usize {
        0
    }

    /// Full or incremental map snapshot.
    fn publish_map(&mut self, _message: &LayerMessage) {}

    /// Changed mesh cells.
    fn publish_mesh(&mut self, _message: &MeshMessage) {}

    /// A finished submap.
    fn publish_submap(&mut self, _bundle: &SubmapBundle) {}

    /// Folder a finished submap was written to.
    fn publish_submap_path(&mut self, _path: &Path) {}

    /// Outcome of pose refinement for one cloud.
    fn publish_refinement(&mut self, _update: &RefinementUpdate) {}

    /// Sensor-frame points the engine actually fused.
    fn publish_reprojected_pointcloud(&mut self, _timestamp: Timestamp, _frame_id: &str, _points: &Pointcloud) {}

    /// Every observed voxel with its distance.
    fn publish_distance_pointcloud(&mut self, _points: &[IntensityPoint]) {}

    /// Voxels near the surface with their color.
    fn publish_surface_pointcloud(&mut self, _points: &[ColoredPoint]) {}

    /// Centers of occupied voxels.
    fn publish_occupied_voxels(&mut self, _centers: &[Point]) {}

    /// Distance slice at the configured height.
    fn publish_slice(&mut self, _points: &[IntensityPoint]) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPublisher;

impl MapPublisher for NullPublisher {}

/// Logs a one-line summary of each output.
///
/// Reports fixed subscriber counts so map and submap snapshots are built.
#[derive(Clone, Debug)]
pub struct LogPublisher {
    map_subscribers: usize,
    submap_subscribers: usize,
}

impl LogPublisher {
    /// Create with fixed subscriber counts.
    pub fn new(map_subscribers: usize, submap_subscribers: usize) -> Self {
        Self {
            map_subscribers,
            submap_subscribers,
        }
    }
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl MapPublisher for LogPublisher {
    fn num_map_subscribers(&self) -> usize {
        self.map_subscribers
    }

    fn num_submap_subscribers(&self) -> usize {
        self.submap_subscribers
    }

    fn publish_map(&mut self, message: &LayerMessage) {
        log::info!("[map] {:?} with {} blocks", message.action, message.num_blocks());
    }

    fn publish_mesh(&mut self, message: &MeshMessage) {
        let vertices: usize = message.blocks.iter().map(|b| b.vertices.len()).sum();
        log::info!("[mesh] {} blocks, {} vertices", message.blocks.len(), vertices);
    }

    fn publish_submap(&mut self, bundle: &SubmapBundle) {
        log::info!(
            "[submap] #{} from {}: {} blocks, {} poses",
            bundle.index,
            bundle.robot_name,
            bundle.layer.num_blocks(),
            bundle.trajectory.stamped_poses.len()
        );
    }

    fn publish_submap_path(&mut self, path: &Path) {
        log::info!("[submap] written to {}", path.display());
    }

    fn publish_refinement(&mut self, update: &RefinementUpdate) {
        let p = update.correction.position();
        log::debug!(
            "[refine] {} steps, correction ({:.3}, {:.3}, {:.3}) yaw {:.4}",
            update.update_count,
            p.x,
            p.y,
            p.z,
            update.correction.yaw()
        );
    }

    fn publish_distance_pointcloud(&mut self, points: &[IntensityPoint]) {
        log::debug!("[tsdf_pointcloud] {} points", points.len());
    }

    fn publish_surface_pointcloud(&mut self, points: &[ColoredPoint]) {
        log::debug!("[surface_pointcloud] {} points", points.len());
    }

    fn publish_occupied_voxels(&mut self, centers: &[Point]) {
        log::debug!("[occupied_nodes] {} voxels", centers.len());
    }

    fn publish_slice(&mut self, points: &[IntensityPoint]) {
        log::debug!("[tsdf_slice] {} points", points.len());
    }
}
