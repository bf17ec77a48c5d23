//! Default value functions for serde deserialization.

pub fn world_frame() -> String {
    "world".to_string()
}

pub fn robot_name() -> String {
    "robot".to_string()
}

pub fn slice_level() -> f32 {
    0.5
}

pub fn enabled() -> bool {
    true
}

pub fn timer_period() -> f64 {
    1.0
}

pub fn intensity_colormap() -> String {
    "rainbow".to_string()
}

pub fn intensity_max_value() -> f32 {
    100.0
}

pub fn transform_buffer_secs() -> f64 {
    10.0
}

pub fn voxel_size() -> f32 {
    0.2
}

pub fn voxels_per_side() -> usize {
    16
}

pub fn integrator_method() -> String {
    "simple".to_string()
}

pub fn truncation_distance() -> f32 {
    0.4
}

pub fn max_weight() -> f32 {
    10_000.0
}

pub fn min_ray_length() -> f32 {
    0.1
}

pub fn max_ray_length() -> f32 {
    5.0
}

pub fn mesh_min_weight() -> f32 {
    1e-4
}

pub fn surface_distance_factor() -> f32 {
    0.75
}

pub fn icp_iterations() -> usize {
    15
}

pub fn icp_min_match_ratio() -> f32 {
    0.8
}

pub fn icp_subsample_keep_ratio() -> f32 {
    0.5
}

pub fn icp_prior_weighting() -> f32 {
    100.0
}

pub fn icp_min_voxel_weight() -> f32 {
    1e-6
}

pub fn icp_convergence_epsilon() -> f32 {
    1e-5
}

pub fn submap_directory_prefix() -> String {
    "vastu_submap".to_string()
}
