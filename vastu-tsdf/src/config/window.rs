//! Sliding-window deintegration thresholds.

use serde::{Deserialize, Serialize};

/// Raw window thresholds as read from the file.
///
/// Each must be strictly positive when present. The server logs and ignores
/// any that are not.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeintegrationConfig {
    /// Maximum number of live clouds
    #[serde(default)]
    pub max_queue_length: Option<i64>,

    /// Maximum time span between oldest and newest live cloud (seconds)
    #[serde(default)]
    pub max_time_interval: Option<f64>,

    /// Maximum distance between oldest and newest live sensor position (meters)
    #[serde(default)]
    pub max_distance_travelled: Option<f32>,
}
