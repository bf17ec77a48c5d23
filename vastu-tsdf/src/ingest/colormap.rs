//! Intensity to color mapping.

use crate::core::Color;

/// Maps a scalar intensity to a color.
pub trait ColorMap: Send {
    /// Intensity that maps to the top of the scale.
    fn set_max_value(&mut self, max_value: f32);

    /// Color for an intensity.
    fn color_lookup(&self, value: f32) -> Color;
}

/// Build a colormap by name, falling back to rainbow for unknown names.
pub fn colormap_from_name(name: &str, max_value: f32) -> Box<dyn ColorMap> {
    let mut map: Box<dyn ColorMap> = match name {
        "rainbow" => Box::new(RainbowColorMap::default()),
        "inverse_rainbow" => Box::new(InverseRainbowColorMap::default()),
        "grayscale" => Box::new(GrayscaleColorMap::default()),
        "inverse_grayscale" => Box::new(InverseGrayscaleColorMap::default()),
        "ironbow" => Box::new(IronbowColorMap::default()),
        other => {
            log::error!("Invalid color map: {}", other);
            Box::new(RainbowColorMap::default())
        }
    };
    map.set_max_value(max_value);
    map
}

/// Scale a value into `[0, 1]`.
fn normalize(value: f32, max_value: f32) -> f32 {
    if max_value <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / max_value).clamp(0.0, 1.0)
}

/// HSV hue sweep with full saturation and value. `h` wraps at 1.
pub fn rainbow(h: f32) -> Color {
    let h = (h - h.floor()) * 6.0;
    let sector = h.floor() as i32;
    let mut f = h - sector as f32;
    if sector % 2 == 0 {
        f = 1.0 - f;
    }
    let n = 1.0 - f;
    let (r, g, b) = match sector {
        0 | 6 => (1.0, n, 0.0),
        1 => (n, 1.0, 0.0),
        2 => (0.0, 1.0, n),
        3 => (0.0, n, 1.0),
        4 => (n, 0.0, 1.0),
        5 => (1.0, 0.0, n),
        _ => (1.0, 0.5, 0.5),
    };
    let to_u8 = |c: f32| (c * 255.0).round() as u8;
    Color::rgb(to_u8(r), to_u8(g), to_u8(b))
}

fn gray(level: f32) -> Color {
    let v = (level * 255.0).round() as u8;
    Color::rgb(v, v, v)
}

/// Red at zero sweeping through the hues.
#[derive(Clone, Debug)]
pub struct RainbowColorMap {
    max_value: f32,
}

impl Default for RainbowColorMap {
    fn default() -> Self {
        Self { max_value: 100.0 }
    }
}

impl ColorMap for RainbowColorMap {
    fn set_max_value(&mut self, max_value: f32) {
        self.max_value = max_value;
    }

    fn color_lookup(&self, value: f32) -> Color {
        rainbow(normalize(value, self.max_value) * 2.0 / 3.0)
    }
}

/// Rainbow with the scale reversed.
#[derive(Clone, Debug, Default)]
pub struct InverseRainbowColorMap {
    inner: RainbowColorMap,
}

impl ColorMap for InverseRainbowColorMap {
    fn set_max_value(&mut self, max_value: f32) {
        self.inner.set_max_value(max_value);
    }

    fn color_lookup(&self, value: f32) -> Color {
        rainbow((1.0 - normalize(value, self.inner.max_value)) * 2.0 / 3.0)
    }
}

/// Black at zero to white at max.
#[derive(Clone, Debug)]
pub struct GrayscaleColorMap {
    max_value: f32,
}

impl Default for GrayscaleColorMap {
    fn default() -> Self {
        Self { max_value: 100.0 }
    }
}

impl ColorMap for GrayscaleColorMap {
    fn set_max_value(&mut self, max_value: f32) {
        self.max_value = max_value;
    }

    fn color_lookup(&self, value: f32) -> Color {
        gray(normalize(value, self.max_value))
    }
}

/// White at zero to black at max.
#[derive(Clone, Debug, Default)]
pub struct InverseGrayscaleColorMap {
    inner: GrayscaleColorMap,
}

impl ColorMap for InverseGrayscaleColorMap {
    fn set_max_value(&mut self, max_value: f32) {
        self.inner.set_max_value(max_value);
    }

    fn color_lookup(&self, value: f32) -> Color {
        gray(1.0 - normalize(value, self.inner.max_value))
    }
}

/// Thermal-camera palette, black through purple and orange to white.
#[derive(Clone, Debug)]
pub struct IronbowColorMap {
    max_value: f32,
}

impl Default for IronbowColorMap {
    fn default() -> Self {
        Self { max_value: 100.0 }
    }
}

const IRONBOW: [[f32; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.569, 0.0, 0.612],
    [0.898, 0.153, 0.365],
    [0.988, 0.545, 0.0],
    [1.0, 0.863, 0.278],
    [1.0, 1.0, 1.0],
];

impl ColorMap for IronbowColorMap {
    fn set_max_value(&mut self, max_value: f32) {
        self.max_value = max_value;
    }

    fn color_lookup(&self, value: f32) -> Color {
        let scaled = normalize(value, self.max_value) * (IRONBOW.len() - 1) as f32;
        let lower = (scaled.floor() as usize).min(IRONBOW.len() - 2);
        let t = scaled - lower as f32;
        let (a, b) = (IRONBOW[lower], IRONBOW[lower + 1]);
        let channel = |i: usize| ((a[i] + (b[i] - a[i]) * t) * 255.0).round() as u8;
        Color::rgb(channel(0), channel(1), channel(2))
    }
}
