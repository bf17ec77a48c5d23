//! Configuration for the TSDF server.
//!
//! Everything is loaded once at startup from a single TOML file. Every field
//! has a default, so an empty file yields a working server.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! world_frame = "odom"
//! min_time_between_msgs_sec = 0.05
//!
//! [map]
//! voxel_size = 0.1
//!
//! [deintegration]
//! max_time_interval = 20.0
//!
//! [submap]
//! max_distance_travelled = 25.0
//! persist_to_directory = "/data/submaps"
//! ```

mod defaults;
mod error;
mod integrator;
mod map;
mod persistence;
mod refinement;
mod server;
mod submap;
mod window;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::ConfigError;
pub use integrator::IntegratorConfig;
pub use map::{MapConfig, MeshConfig};
pub use persistence::{has_only_printable_ascii, validate_persistence_root};
pub use refinement::{IcpConfig, RefinementConfig};
pub use server::ServerSection;
pub use submap::SubmapConfig;
pub use window::DeintegrationConfig;

/// Full server configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Frames, rate gate, outputs and timers
    #[serde(default)]
    pub server: ServerSection,

    /// Map geometry
    #[serde(default)]
    pub map: MapConfig,

    /// Fusion engine
    #[serde(default)]
    pub integrator: IntegratorConfig,

    /// Mesh extraction
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Pose refinement
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Sliding-window deintegration thresholds
    #[serde(default)]
    pub deintegration: DeintegrationConfig,

    /// Submap thresholds and persistence
    #[serde(default)]
    pub submap: SubmapConfig,
}

impl ServerConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load `configs/tsdf.toml` if present, defaults otherwise.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Path::new("configs/tsdf.toml");
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no server could run with.
    ///
    /// Optional thresholds are not checked here: invalid ones are logged and
    /// ignored when the server is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.map.validate()?;
        self.integrator.validate()?;
        self.server.validate()?;
        self.refinement.icp.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.server.world_frame, "world");
        assert_eq!(config.server.robot_name, "robot");
        assert_eq!(config.map.voxels_per_side, 16);
        assert_eq!(config.integrator.method, "simple");
        assert!(config.deintegration.max_queue_length.is_none());
        assert!(config.submap.max_time_interval.is_none());
        assert!(config.submap.persist_to_directory.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [server]
            min_time_between_msgs_sec = 0.25
            publish_tsdf_map = true

            [deintegration]
            max_queue_length = 30
            max_distance_travelled = 4.5

            [submap]
            max_time_interval = 60.0
            persist_to_directory = "/tmp/submaps/"
        "#;
        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.min_time_between_msgs_sec, 0.25);
        assert!(config.server.publish_tsdf_map);
        assert_eq!(config.deintegration.max_queue_length, Some(30));
        assert_eq!(config.deintegration.max_distance_travelled, Some(4.5));
        assert!(config.deintegration.max_time_interval.is_none());
        assert_eq!(config.submap.max_time_interval, Some(60.0));
        assert_eq!(config.submap.directory_prefix, "vastu_submap");
    }

    #[test]
    fn test_invalid_voxel_size_rejected() {
        let result = ServerConfig::from_toml("[map]\nvoxel_size = 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = ServerConfig::from_toml("[map\nvoxel_size = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ServerConfig::load(Path::new("/nonexistent/tsdf.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
