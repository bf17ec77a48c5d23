//! Submap segmentation settings.

use serde::{Deserialize, Serialize};

use super::defaults;

/// Raw submap thresholds and persistence target.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmapConfig {
    /// Finalize after this many seconds (must be positive if set)
    #[serde(default)]
    pub max_time_interval: Option<f64>,

    /// Finalize after travelling this far (must be positive if set)
    #[serde(default)]
    pub max_distance_travelled: Option<f32>,

    /// Absolute, printable-ASCII directory for finished submaps (empty = off)
    #[serde(default)]
    pub persist_to_directory: String,

    /// Submap folders are named `<prefix>_<index>`
    #[serde(default = "defaults::submap_directory_prefix")]
    pub directory_prefix: String,
}

impl Default for SubmapConfig {
    fn default() -> Self {
        Self {
            max_time_interval: None,
            max_distance_travelled: None,
            persist_to_directory: String::new(),
            directory_prefix: defaults::submap_directory_prefix(),
        }
    }
}
