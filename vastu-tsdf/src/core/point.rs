//! Point and color buffers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 3D point in meters.
pub type Point = nalgebra::Vector3<f32>;

/// Owned point buffer.
pub type Pointcloud = Vec<Point>;

/// Owned color buffer, one entry per point.
pub type Colors = Vec<Color>;

/// Immutable point buffer shared between the fusion call and the window.
pub type SharedPointcloud = Arc<Pointcloud>;

/// Immutable color buffer shared between the fusion call and the window.
pub type SharedColors = Arc<Colors>;

/// RGBA color with 8 bits per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    /// Opaque black.
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with explicit alpha.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Weighted blend of two colors.
    ///
    /// Weights do not need to sum to one. A non-positive total keeps `self`.
    pub fn blend(&self, weight: f32, other: &Color, other_weight: f32) -> Color {
        let total = weight + other_weight;
        if total <= 0.0 {
            return *self;
        }
        let mix = |a: u8, b: u8| -> u8 {
            ((a as f32 * weight + b as f32 * other_weight) / total)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}
