//! Incoming point cloud messages.

use serde::{Deserialize, Serialize};

use crate::core::{Color, Colors, Point, Pointcloud, Timestamp};

use super::colormap::ColorMap;

/// Per-point attributes carried by a message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PointPayload {
    /// Geometry only
    None,
    /// One RGB(A) color per point
    Rgb(Vec<Color>),
    /// One intensity per point, colored through a [`ColorMap`]
    Intensity(Vec<f32>),
}

/// A point cloud as received from the sensor driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointcloudMessage {
    /// Acquisition time
    pub timestamp: Timestamp,
    /// Sensor frame the points are expressed in
    pub frame_id: String,
    /// Points in the sensor frame
    pub points: Vec<Point>,
    /// Optional per-point attributes
    pub payload: PointPayload,
}

impl PointcloudMessage {
    /// Geometry-only message.
    pub fn new(timestamp: Timestamp, frame_id: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            timestamp,
            frame_id: frame_id.into(),
            points,
            payload: PointPayload::None,
        }
    }

    /// Attach per-point colors.
    pub fn with_colors(mut self, colors: Vec<Color>) -> Self {
        self.payload = PointPayload::Rgb(colors);
        self
    }

    /// Attach per-point intensities.
    pub fn with_intensities(mut self, intensities: Vec<f32>) -> Self {
        self.payload = PointPayload::Intensity(intensities);
        self
    }

    /// Convert to fusion buffers.
    ///
    /// Non-finite points are dropped. The returned buffers always have equal
    /// length: points beyond the end of a short attribute list get the
    /// default color.
    pub fn to_pointcloud(&self, color_map: &dyn ColorMap) -> (Pointcloud, Colors) {
        let mut points = Vec::with_capacity(self.points.len());
        let mut colors = Vec::with_capacity(self.points.len());
        for (i, point) in self.points.iter().enumerate() {
            if !point.iter().all(|v| v.is_finite()) {
                continue;
            }
            let color = match &self.payload {
                PointPayload::None => Color::WHITE,
                PointPayload::Rgb(rgb) => rgb.get(i).copied().unwrap_or(Color::WHITE),
                PointPayload::Intensity(values) => values
                    .get(i)
                    .map(|v| color_map.color_lookup(*v))
                    .unwrap_or(Color::WHITE),
            };
            points.push(*point);
            colors.push(color);
        }
        (points, colors)
    }
}
