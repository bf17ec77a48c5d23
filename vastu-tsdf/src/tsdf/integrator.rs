//! Fusion engines: forward and backward TSDF updates along sensor rays.
//!
//! Every engine shares the same per-voxel update, a weighted running average
//! of truncated signed distances:
//!
//! ```text
//! d' = (d·W + sdf·w) / (W + w)        W' = min(W + w, max_weight)
//! ```
//!
//! Deintegration applies the same update with `-w`, which undoes a previous
//! integration of the same cloud up to truncation clamping and the weight
//! cap. A voxel whose weight drops to zero is reset to the empty state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigError, IntegratorConfig};
use crate::core::{Color, Colors, Point, Pointcloud, Transform};

use super::layer::TsdfLayer;
use super::raycaster::VoxelRay;
use super::voxel::{TsdfVoxel, VoxelIndex, WEIGHT_EPSILON};

/// Available engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorMethod {
    /// One ray per point. Supports deintegration.
    Simple,
    /// Points bundled per voxel, one ray per bundle.
    Merged,
}

impl FromStr for IntegratorMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "merged" => Ok(Self::Merged),
            other => Err(ConfigError::Invalid(format!(
                "unknown integrator method \"{}\" (expected \"simple\" or \"merged\")",
                other
            ))),
        }
    }
}

impl fmt::Display for IntegratorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Forward/backward fusion of point clouds into a [`TsdfLayer`].
pub trait FusionEngine: Send {
    /// Which engine this is.
    fn method(&self) -> IntegratorMethod;

    /// Whether `integrate(.., deintegrate = true)` undoes a prior integration.
    fn supports_deintegration(&self) -> bool;

    /// Fuse (or with `deintegrate`, remove) one cloud given in the sensor frame.
    ///
    /// # Panics
    ///
    /// Panics if `points` and `colors` differ in length.
    fn integrate(
        &mut self,
        layer: &mut TsdfLayer,
        pose: &Transform,
        points: &Pointcloud,
        colors: &Colors,
        is_freespace: bool,
        deintegrate: bool,
    );

    /// Sensor-frame points that were actually fused by the last call, if the
    /// engine keeps them.
    fn reprojected_pointcloud(&self) -> Option<&Pointcloud> {
        None
    }
}

/// Build the engine named in the configuration.
pub fn create_engine(config: &IntegratorConfig) -> Result<Box<dyn FusionEngine>, ConfigError> {
    let engine: Box<dyn FusionEngine> = match config.method.parse::<IntegratorMethod>()? {
        IntegratorMethod::Simple => Box::new(SimpleIntegrator::new(config.clone())),
        IntegratorMethod::Merged => Box::new(MergedIntegrator::new(config.clone())),
    };
    Ok(engine)
}

/// One measurement ray ready for casting.
struct Ray {
    origin: Point,
    point_g: Point,
    is_clearing: bool,
    weight: f32,
    color: Color,
}

/// Ray construction and the per-voxel update shared by all engines.
#[derive(Clone, Debug)]
struct RayFusion {
    config: IntegratorConfig,
}

impl RayFusion {
    /// Weight of a single measurement, falling off with squared range.
    fn measurement_weight(&self, point_c: &Point) -> f32 {
        if self.config.use_const_weight {
            return 1.0;
        }
        let range_sq = point_c.norm_squared();
        if range_sq > f32::EPSILON { 1.0 / range_sq } else { 1.0 }
    }

    /// Classify a sensor-frame point. `None` means it is not fused at all.
    fn make_ray(&self, pose: &Transform, point_c: &Point, color: Color, weight: f32) -> Option<Ray> {
        if !point_c.iter().all(|v| v.is_finite()) {
            return None;
        }
        let range = point_c.norm();
        if range < self.config.min_ray_length_m {
            return None;
        }
        let origin = pose.position();
        if range > self.config.max_ray_length_m {
            if !self.config.allow_clear {
                return None;
            }
            let clipped = point_c * (self.config.max_ray_length_m / range);
            return Some(Ray {
                origin,
                point_g: pose.transform_point(&clipped),
                is_clearing: true,
                weight,
                color,
            });
        }
        Some(Ray {
            origin,
            point_g: pose.transform_point(point_c),
            is_clearing: false,
            weight,
            color,
        })
    }

    /// Walk one ray and update every voxel it crosses.
    fn cast(&self, layer: &mut TsdfLayer, ray: &Ray, is_freespace: bool, deintegrate: bool) {
        let truncation = self.config.truncation_distance;
        let offset = ray.point_g - ray.origin;
        let length = offset.norm();
        if length <= f32::EPSILON {
            return;
        }
        let unit = offset / length;

        let end = if ray.is_clearing {
            ray.point_g
        } else {
            ray.point_g + unit * truncation
        };
        let start = if self.config.voxel_carving_enabled || ray.is_clearing {
            ray.origin
        } else {
            ray.point_g - unit * truncation
        };

        let voxel_size = layer.voxel_size();
        for index in VoxelRay::new(&start, &end, voxel_size) {
            let center = layer.voxel_center(index);
            let sdf = signed_distance(&ray.origin, &ray.point_g, &center);
            if (is_freespace || ray.is_clearing) && sdf < truncation {
                continue;
            }
            self.update_voxel(layer, index, sdf, ray, deintegrate);
        }
    }

    fn update_voxel(&self, layer: &mut TsdfLayer, index: VoxelIndex, sdf: f32, ray: &Ray, deintegrate: bool) {
        let truncation = self.config.truncation_distance;
        let mut weight = ray.weight;
        if self.config.use_weight_dropoff {
            let dropoff_epsilon = layer.voxel_size();
            if sdf < -dropoff_epsilon {
                weight *= (truncation + sdf) / (truncation - dropoff_epsilon);
                weight = weight.max(0.0);
            }
        }
        if weight <= 0.0 {
            return;
        }
        if deintegrate {
            weight = -weight;
        }

        // Deintegration never allocates: a missing block has nothing to remove.
        let Some(voxel) = layer.voxel_for_update(index, !deintegrate) else {
            return;
        };
        let new_weight = voxel.weight + weight;
        if new_weight <= WEIGHT_EPSILON {
            *voxel = TsdfVoxel::default();
            return;
        }
        if !deintegrate {
            voxel.color = voxel.color.blend(voxel.weight, &ray.color, weight);
        }
        let new_distance = (voxel.distance * voxel.weight + sdf * weight) / new_weight;
        voxel.distance = new_distance.clamp(-truncation, truncation);
        voxel.weight = new_weight.min(self.config.max_weight);
    }
}

/// Signed distance from a voxel center to the measured surface, along the ray.
fn signed_distance(origin: &Point, point_g: &Point, voxel_center: &Point) -> f32 {
    let v_point = point_g - origin;
    let v_voxel = voxel_center - origin;
    let dist = v_point.norm();
    let along = v_voxel.dot(&v_point) / dist;
    dist - along
}

fn assert_matching_lengths(points: &Pointcloud, colors: &Colors) {
    assert_eq!(
        points.len(),
        colors.len(),
        "fusion needs one color per point ({} points, {} colors)",
        points.len(),
        colors.len()
    );
}

/// Casts one ray per point.
#[derive(Clone, Debug)]
pub struct SimpleIntegrator {
    fusion: RayFusion,
    last_fused: Pointcloud,
}

impl SimpleIntegrator {
    /// Create with the given parameters.
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            fusion: RayFusion { config },
            last_fused: Vec::new(),
        }
    }
}

impl FusionEngine for SimpleIntegrator {
    fn method(&self) -> IntegratorMethod {
        IntegratorMethod::Simple
    }

    fn supports_deintegration(&self) -> bool {
        true
    }

    fn integrate(
        &mut self,
        layer: &mut TsdfLayer,
        pose: &Transform,
        points: &Pointcloud,
        colors: &Colors,
        is_freespace: bool,
        deintegrate: bool,
    ) {
        assert_matching_lengths(points, colors);
        self.last_fused.clear();
        for (point_c, color) in points.iter().zip(colors.iter()) {
            let weight = self.fusion.measurement_weight(point_c);
            let Some(ray) = self.fusion.make_ray(pose, point_c, *color, weight) else {
                continue;
            };
            self.fusion.cast(layer, &ray, is_freespace, deintegrate);
            if !ray.is_clearing {
                self.last_fused.push(*point_c);
            }
        }
    }

    fn reprojected_pointcloud(&self) -> Option<&Pointcloud> {
        Some(&self.last_fused)
    }
}

/// Bundles points that land in the same voxel and casts one ray per bundle.
///
/// Much faster on dense clouds. The bundling depends on the map grid at
/// integration time, so backward fusion is not offered.
#[derive(Clone, Debug)]
pub struct MergedIntegrator {
    fusion: RayFusion,
}

#[derive(Default)]
struct Bundle {
    point_sum: Point,
    color_sum: [f32; 4],
    weight_sum: f32,
    count: usize,
}

impl MergedIntegrator {
    /// Create with the given parameters.
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            fusion: RayFusion { config },
        }
    }
}

impl FusionEngine for MergedIntegrator {
    fn method(&self) -> IntegratorMethod {
        IntegratorMethod::Merged
    }

    fn supports_deintegration(&self) -> bool {
        false
    }

    fn integrate(
        &mut self,
        layer: &mut TsdfLayer,
        pose: &Transform,
        points: &Pointcloud,
        colors: &Colors,
        is_freespace: bool,
        deintegrate: bool,
    ) {
        assert_matching_lengths(points, colors);
        if deintegrate {
            log::warn!("Merged integrator cannot deintegrate, ignoring {} points", points.len());
            return;
        }

        let mut bundles: HashMap<VoxelIndex, Bundle> = HashMap::new();
        let mut clearing = Vec::new();
        for (point_c, color) in points.iter().zip(colors.iter()) {
            let weight = self.fusion.measurement_weight(point_c);
            let Some(ray) = self.fusion.make_ray(pose, point_c, *color, weight) else {
                continue;
            };
            if ray.is_clearing {
                clearing.push(ray);
                continue;
            }
            let bundle = bundles.entry(layer.voxel_index(&ray.point_g)).or_default();
            bundle.point_sum += *point_c;
            bundle.color_sum[0] += color.r as f32;
            bundle.color_sum[1] += color.g as f32;
            bundle.color_sum[2] += color.b as f32;
            bundle.color_sum[3] += color.a as f32;
            bundle.weight_sum += weight;
            bundle.count += 1;
        }

        for bundle in bundles.into_values() {
            let n = bundle.count as f32;
            let mean_c = bundle.point_sum / n;
            let channel = |i: usize| (bundle.color_sum[i] / n).round().clamp(0.0, 255.0) as u8;
            let ray = Ray {
                origin: pose.position(),
                point_g: pose.transform_point(&mean_c),
                is_clearing: false,
                weight: bundle.weight_sum,
                color: Color::rgba(channel(0), channel(1), channel(2), channel(3)),
            };
            self.fusion.cast(layer, &ray, is_freespace, false);
        }
        for ray in &clearing {
            self.fusion.cast(layer, ray, is_freespace, false);
        }
    }
}
