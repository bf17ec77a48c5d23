//! Test utilities for the TSDF server.
//!
//! Builds small maps from synthetic walls seen by a sensor moving along +x.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use vastu_tsdf::io::LayerMessage;
use vastu_tsdf::submap::SubmapBundle;
use vastu_tsdf::tsdf::MeshMessage;
use vastu_tsdf::{
    MapPublisher, Point, PointcloudMessage, ServerConfig, Timestamp, Transform, TransformBuffer, TsdfServer,
};

/// Sensor frame used by every helper.
pub const SENSOR_FRAME: &str = "lidar";

/// Keeps every output so tests can inspect it.
#[derive(Default)]
pub struct RecordingPublisher {
    pub map_subscribers: usize,
    pub submap_subscribers: usize,
    pub maps: Vec<LayerMessage>,
    pub meshes: Vec<MeshMessage>,
    pub submaps: Vec<SubmapBundle>,
    pub submap_paths: Vec<PathBuf>,
}

impl RecordingPublisher {
    /// Publisher with one listener on the map and submap streams.
    pub fn listening() -> Self {
        Self {
            map_subscribers: 1,
            submap_subscribers: 1,
            ..Self::default()
        }
    }
}

impl MapPublisher for RecordingPublisher {
    fn num_map_subscribers(&self) -> usize {
        self.map_subscribers
    }

    fn num_submap_subscribers(&self) -> usize {
        self.submap_subscribers
    }

    fn publish_map(&mut self, message: &LayerMessage) {
        self.maps.push(message.clone());
    }

    fn publish_mesh(&mut self, message: &MeshMessage) {
        self.meshes.push(message.clone());
    }

    fn publish_submap(&mut self, bundle: &SubmapBundle) {
        self.submaps.push(bundle.clone());
    }

    fn publish_submap_path(&mut self, path: &Path) {
        self.submap_paths.push(path.to_path_buf());
    }
}

/// Small, quiet configuration whose fusion deintegrates exactly.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server.verbose = false;
    config.server.update_mesh_every_n_sec = 0.0;
    config.server.publish_map_every_n_sec = 0.0;
    config.map.voxel_size = 0.1;
    config.map.voxels_per_side = 8;
    config.integrator.use_const_weight = true;
    config.integrator.use_weight_dropoff = false;
    config
}

/// Server with a transform buffer and a recording publisher.
pub fn test_server(config: &ServerConfig) -> TsdfServer<TransformBuffer, RecordingPublisher> {
    let resolver = TransformBuffer::new(1000.0);
    TsdfServer::new(config, resolver, RecordingPublisher::listening()).unwrap()
}

/// Stamp from seconds.
pub fn secs(s: f64) -> Timestamp {
    Timestamp::from_secs_f64(s)
}

/// A 0.5 m square wall 1 m ahead of the sensor.
pub fn wall_cloud(stamp: f64) -> PointcloudMessage {
    let mut points = Vec::new();
    for i in -5..=5 {
        for j in -5..=5 {
            points.push(Point::new(1.0, i as f32 * 0.05, j as f32 * 0.05));
        }
    }
    PointcloudMessage::new(secs(stamp), SENSOR_FRAME, points)
}

/// Sensor pose at `x` on the x axis.
pub fn pose_at(x: f32) -> Transform {
    Transform::from_translation(Point::new(x, 0.0, 0.0))
}

/// Record the pose, then offer a wall cloud taken there.
pub fn observe_at(server: &mut TsdfServer<TransformBuffer, RecordingPublisher>, stamp: f64, x: f32) {
    server.resolver_mut().insert(SENSOR_FRAME, secs(stamp), pose_at(x));
    server.insert_pointcloud(wall_cloud(stamp));
}

/// Sorted indices of blocks holding at least one observed voxel.
pub fn observed_blocks(layer: &vastu_tsdf::TsdfLayer) -> Vec<vastu_tsdf::tsdf::BlockIndex> {
    let mut indices: Vec<_> = layer
        .blocks()
        .filter(|block| block.has_observed_voxels())
        .map(|block| block.index())
        .collect();
    indices.sort();
    indices
}
