//! Point-based views of the TSDF for visualization consumers.

use serde::{Deserialize, Serialize};

use crate::core::{Color, Point};

use super::layer::TsdfLayer;

/// A point with a scalar attached (distance).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntensityPoint {
    /// World position
    pub position: Point,
    /// Scalar value
    pub intensity: f32,
}

/// A point with a color attached.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColoredPoint {
    /// World position
    pub position: Point,
    /// Voxel color
    pub color: Color,
}

/// Every observed voxel center with its distance as intensity.
pub fn distance_pointcloud(layer: &TsdfLayer) -> Vec<IntensityPoint> {
    let mut out = Vec::new();
    for block in layer.blocks() {
        for (linear, voxel) in block.voxels().iter().enumerate() {
            if voxel.is_observed() {
                out.push(IntensityPoint {
                    position: block.voxel_center(linear),
                    intensity: voxel.distance,
                });
            }
        }
    }
    out
}

/// Observed voxels within `surface_distance` of the zero crossing.
pub fn surface_pointcloud(layer: &TsdfLayer, surface_distance: f32) -> Vec<ColoredPoint> {
    let mut out = Vec::new();
    for block in layer.blocks() {
        for (linear, voxel) in block.voxels().iter().enumerate() {
            if voxel.is_observed() && voxel.distance.abs() < surface_distance {
                out.push(ColoredPoint {
                    position: block.voxel_center(linear),
                    color: voxel.color,
                });
            }
        }
    }
    out
}

/// Centers of voxels treated as occupied (within one voxel of the surface).
pub fn occupied_voxels(layer: &TsdfLayer) -> Vec<Point> {
    let voxel_size = layer.voxel_size();
    let mut out = Vec::new();
    for block in layer.blocks() {
        for (linear, voxel) in block.voxels().iter().enumerate() {
            if voxel.is_observed() && voxel.distance.abs() < voxel_size {
                out.push(block.voxel_center(linear));
            }
        }
    }
    out
}

/// Observed voxels in the single voxel plane containing `level` along `axis`.
pub fn distance_slice(layer: &TsdfLayer, axis: usize, level: f32) -> Vec<IntensityPoint> {
    let voxel_size = layer.voxel_size();
    let plane = (level / voxel_size).floor() as i32;
    distance_pointcloud(layer)
        .into_iter()
        .filter(|p| (p.position[axis] / voxel_size).floor() as i32 == plane)
        .collect()
}
