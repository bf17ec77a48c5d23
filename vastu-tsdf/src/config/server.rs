//! Server-level settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use super::defaults;

/// Frames, ingestion, outputs and timers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSection {
    /// Global frame every pose is resolved into
    #[serde(default = "defaults::world_frame")]
    pub world_frame: String,

    /// Robot name written into submaps and trajectories
    #[serde(default = "defaults::robot_name")]
    pub robot_name: String,

    /// Ingest rate gate (seconds, 0 admits everything)
    #[serde(default)]
    pub min_time_between_msgs_sec: f64,

    /// Blocks farther than this from the sensor are dropped (unset = keep all)
    #[serde(default)]
    pub max_block_distance_from_body: Option<f32>,

    /// Height of the published distance slice (meters)
    #[serde(default = "defaults::slice_level")]
    pub slice_level: f32,

    /// Publish visualization clouds after every processed message
    #[serde(default)]
    pub publish_pointclouds_on_update: bool,

    /// Include the horizontal distance slice in visualization output
    #[serde(default)]
    pub publish_slices: bool,

    /// Publish visualization clouds on the mesh timer
    #[serde(default)]
    pub publish_pointclouds: bool,

    /// Publish serialized map snapshots
    #[serde(default)]
    pub publish_tsdf_map: bool,

    /// Accept the freespace point cloud stream
    #[serde(default)]
    pub use_freespace_pointcloud: bool,

    /// Log per-message timing and memory
    #[serde(default = "defaults::enabled")]
    pub verbose: bool,

    /// Keep the last published mesh message in memory
    #[serde(default)]
    pub cache_mesh: bool,

    /// Incremental mesh update period (seconds, <= 0 disables)
    #[serde(default = "defaults::timer_period")]
    pub update_mesh_every_n_sec: f64,

    /// Map publish period (seconds, <= 0 disables)
    #[serde(default = "defaults::timer_period")]
    pub publish_map_every_n_sec: f64,

    /// PLY output path for `generate_mesh` (empty = no export)
    #[serde(default)]
    pub mesh_filename: String,

    /// Colormap for intensity clouds
    #[serde(default = "defaults::intensity_colormap")]
    pub intensity_colormap: String,

    /// Intensity mapped to the top of the colormap
    #[serde(default = "defaults::intensity_max_value")]
    pub intensity_max_value: f32,

    /// How much pose history the transform buffer keeps (seconds)
    #[serde(default = "defaults::transform_buffer_secs")]
    pub transform_buffer_secs: f64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            world_frame: defaults::world_frame(),
            robot_name: defaults::robot_name(),
            min_time_between_msgs_sec: 0.0,
            max_block_distance_from_body: None,
            slice_level: defaults::slice_level(),
            publish_pointclouds_on_update: false,
            publish_slices: false,
            publish_pointclouds: false,
            publish_tsdf_map: false,
            use_freespace_pointcloud: false,
            verbose: defaults::enabled(),
            cache_mesh: false,
            update_mesh_every_n_sec: defaults::timer_period(),
            publish_map_every_n_sec: defaults::timer_period(),
            mesh_filename: String::new(),
            intensity_colormap: defaults::intensity_colormap(),
            intensity_max_value: defaults::intensity_max_value(),
            transform_buffer_secs: defaults::transform_buffer_secs(),
        }
    }
}

impl ServerSection {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_time_between_msgs_sec >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_time_between_msgs_sec must be >= 0, got {}",
                self.min_time_between_msgs_sec
            )));
        }
        if !(self.intensity_max_value > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "intensity_max_value must be positive, got {}",
                self.intensity_max_value
            )));
        }
        if self.world_frame.is_empty() {
            return Err(ConfigError::Invalid("world_frame is empty".to_string()));
        }
        Ok(())
    }
}
