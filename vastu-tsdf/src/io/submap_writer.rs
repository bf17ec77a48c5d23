//! On-disk layout of finished submaps.
//!
//! ```text
//! <root>/
//!   <prefix>_0/
//!     volumetric_map.tsdf
//!     robot_trajectory.traj
//!   <prefix>_1/
//!     ...
//! ```
//!
//! Leftover folders from an earlier run are overwritten one submap at a time.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::config::has_only_printable_ascii;
use crate::tsdf::TsdfLayer;

use super::error::PersistError;
use super::layer_format::save_layer;
use super::trajectory::TrajectoryFile;

/// Map file name inside a submap folder.
pub const MAP_FILE_NAME: &str = "volumetric_map.tsdf";

/// Trajectory file name inside a submap folder.
pub const TRAJECTORY_FILE_NAME: &str = "robot_trajectory.traj";

/// Folder for submap `index` under `root`.
pub fn submap_directory(root: &Path, prefix: &str, index: u32) -> PathBuf {
    root.join(format!("{}_{}", prefix, index))
}

/// Create every missing directory along `path`.
///
/// Components that already exist are accepted. Components with bytes outside
/// printable ASCII are rejected before anything below them is created.
pub fn create_path(path: &Path) -> Result<(), PersistError> {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        let Component::Normal(name) = component else {
            continue;
        };
        let valid = name.to_str().is_some_and(has_only_printable_ascii);
        if !valid {
            return Err(PersistError::InvalidComponent(name.to_string_lossy().into_owned()));
        }
        match std::fs::create_dir(&current) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists && current.is_dir() => {}
            Err(source) => {
                return Err(PersistError::CreateDirectory {
                    path: current,
                    source,
                });
            }
        }
    }
    Ok(())
}

/// Write a submap folder with its map and trajectory.
pub fn save_submap(directory: &Path, layer: &TsdfLayer, trajectory: &TrajectoryFile) -> Result<(), PersistError> {
    create_path(directory)?;

    let map_path = directory.join(MAP_FILE_NAME);
    save_layer(layer, &map_path).map_err(|source| PersistError::Map {
        path: map_path.clone(),
        source,
    })?;

    let trajectory_path = directory.join(TRAJECTORY_FILE_NAME);
    trajectory.save(&trajectory_path).map_err(|source| PersistError::Trajectory {
        path: trajectory_path.clone(),
        source,
    })?;
    Ok(())
}
