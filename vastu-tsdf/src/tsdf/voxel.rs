//! TSDF voxel and grid indices.

use serde::{Deserialize, Serialize};

use crate::core::Color;

/// Weights at or below this are treated as "never observed".
pub const WEIGHT_EPSILON: f32 = 1e-6;

/// One truncated signed distance sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TsdfVoxel {
    /// Signed distance to the nearest surface (meters, negative behind it)
    pub distance: f32,
    /// Accumulated measurement weight
    pub weight: f32,
    /// Running average color
    pub color: Color,
}

impl TsdfVoxel {
    /// True if the voxel carries any live contribution.
    #[inline]
    pub fn is_observed(&self) -> bool {
        self.weight > WEIGHT_EPSILON
    }

    /// Fold another voxel into this one by weighted average.
    pub fn merge(&mut self, other: &TsdfVoxel) {
        let total = self.weight + other.weight;
        if total <= WEIGHT_EPSILON {
            return;
        }
        self.distance = (self.distance * self.weight + other.distance * other.weight) / total;
        self.color = self.color.blend(self.weight, &other.color, other.weight);
        self.weight = total;
    }
}

/// Index of a block in the block grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockIndex {
    /// X index
    pub x: i32,
    /// Y index
    pub y: i32,
    /// Z index
    pub z: i32,
}

impl BlockIndex {
    /// Create a block index.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Global index of a voxel (independent of blocks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelIndex {
    /// X index
    pub x: i32,
    /// Y index
    pub y: i32,
    /// Z index
    pub z: i32,
}

impl VoxelIndex {
    /// Create a voxel index.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component by axis (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn axis(&self, axis: usize) -> i32 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Mutable component by axis.
    #[inline]
    pub fn axis_mut(&mut self, axis: usize) -> &mut i32 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }

    /// Block containing this voxel and the voxel's position inside it.
    #[inline]
    pub fn split(&self, voxels_per_side: usize) -> (BlockIndex, [usize; 3]) {
        let n = voxels_per_side as i32;
        (
            BlockIndex::new(self.x.div_euclid(n), self.y.div_euclid(n), self.z.div_euclid(n)),
            [
                self.x.rem_euclid(n) as usize,
                self.y.rem_euclid(n) as usize,
                self.z.rem_euclid(n) as usize,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_negative_indices() {
        let (block, local) = VoxelIndex::new(-1, 0, 17).split(16);
        assert_eq!(block, BlockIndex::new(-1, 0, 1));
        assert_eq!(local, [15, 0, 1]);
    }

    #[test]
    fn test_merge_weighted_average() {
        let mut a = TsdfVoxel {
            distance: 0.2,
            weight: 1.0,
            color: Color::BLACK,
        };
        let b = TsdfVoxel {
            distance: -0.1,
            weight: 2.0,
            color: Color::BLACK,
        };
        a.merge(&b);
        assert!((a.distance - 0.0).abs() < 1e-6);
        assert!((a.weight - 3.0).abs() < 1e-6);
    }
}
