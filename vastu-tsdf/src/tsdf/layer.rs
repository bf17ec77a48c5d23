//! Sparse block map holding the TSDF.
//!
//! ```text
//!   world point ──floor(p / voxel_size)──► VoxelIndex
//!                                              │ div_euclid / rem_euclid
//!                                              ▼
//!                           (BlockIndex, local [x, y, z]) ──► HashMap<BlockIndex, Block>
//! ```
//!
//! Blocks are allocated on first write and only freed explicitly: by the
//! pruner, by distance culling, or by clearing the map.

use std::collections::HashMap;

use nalgebra::Vector3;
use thiserror::Error;

use crate::core::Point;

use super::block::{Block, UpdateKind};
use super::voxel::{BlockIndex, TsdfVoxel, VoxelIndex};

/// What to do when an inserted block collides with an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockMergingStrategy {
    /// Fail on collision
    Prohibit,
    /// Overwrite the existing block
    Replace,
    /// Keep the existing block
    Discard,
    /// Weighted voxel-wise merge
    Merge,
}

/// Errors from inserting external blocks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// The block geometry differs from the layer's
    #[error("block {index:?} has voxel_size {voxel_size} / {voxels_per_side} per side, layer has {layer_voxel_size} / {layer_voxels_per_side}")]
    GeometryMismatch {
        /// Offending block
        index: BlockIndex,
        /// Block voxel size
        voxel_size: f32,
        /// Block voxels per side
        voxels_per_side: usize,
        /// Layer voxel size
        layer_voxel_size: f32,
        /// Layer voxels per side
        layer_voxels_per_side: usize,
    },

    /// A block already exists and merging is prohibited
    #[error("block {0:?} already exists")]
    BlockExists(BlockIndex),
}

/// Sparse voxel map.
#[derive(Clone, Debug)]
pub struct TsdfLayer {
    voxel_size: f32,
    voxels_per_side: usize,
    blocks: HashMap<BlockIndex, Block>,
}

impl TsdfLayer {
    /// Create an empty layer.
    pub fn new(voxel_size: f32, voxels_per_side: usize) -> Self {
        Self {
            voxel_size,
            voxels_per_side,
            blocks: HashMap::new(),
        }
    }

    /// Voxel edge length in meters.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Voxels along each block edge.
    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Block edge length in meters.
    pub fn block_size(&self) -> f32 {
        self.voxel_size * self.voxels_per_side as f32
    }

    /// Voxels in one block.
    pub fn voxels_per_block(&self) -> usize {
        self.voxels_per_side.pow(3)
    }

    /// Global voxel index containing a point.
    #[inline]
    pub fn voxel_index(&self, point: &Point) -> VoxelIndex {
        let s = point / self.voxel_size;
        VoxelIndex::new(s.x.floor() as i32, s.y.floor() as i32, s.z.floor() as i32)
    }

    /// Block index containing a point.
    pub fn block_index(&self, point: &Point) -> BlockIndex {
        self.voxel_index(point).split(self.voxels_per_side).0
    }

    /// World position of a voxel center.
    #[inline]
    pub fn voxel_center(&self, index: VoxelIndex) -> Point {
        Point::new(
            index.x as f32 + 0.5,
            index.y as f32 + 0.5,
            index.z as f32 + 0.5,
        ) * self.voxel_size
    }

    /// Number of allocated blocks.
    pub fn num_allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_size(&self) -> usize {
        self.blocks.len()
            * (std::mem::size_of::<Block>() + self.voxels_per_block() * std::mem::size_of::<TsdfVoxel>())
    }

    /// Block by index.
    pub fn block(&self, index: &BlockIndex) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Mutable block by index.
    pub fn block_mut(&mut self, index: &BlockIndex) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Whether a block is allocated.
    pub fn has_block(&self, index: &BlockIndex) -> bool {
        self.blocks.contains_key(index)
    }

    /// Allocated blocks in arbitrary order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Indices of all allocated blocks.
    pub fn block_indices(&self) -> Vec<BlockIndex> {
        self.blocks.keys().copied().collect()
    }

    /// Get or allocate a block.
    pub fn allocate_block(&mut self, index: BlockIndex) -> &mut Block {
        let (vps, size) = (self.voxels_per_side, self.voxel_size);
        self.blocks
            .entry(index)
            .or_insert_with(|| Block::new(index, vps, size))
    }

    /// Voxel by global index, if its block exists.
    pub fn voxel(&self, index: VoxelIndex) -> Option<&TsdfVoxel> {
        let (block, local) = index.split(self.voxels_per_side);
        self.blocks.get(&block).map(|b| b.voxel(local))
    }

    /// Voxel containing a point, if its block exists.
    pub fn voxel_at(&self, point: &Point) -> Option<&TsdfVoxel> {
        self.voxel(self.voxel_index(point))
    }

    /// Mutable voxel for fusion. The owning block is flagged as updated.
    ///
    /// With `allocate` set a missing block is created, otherwise `None` is
    /// returned for voxels outside the allocated map.
    pub fn voxel_for_update(&mut self, index: VoxelIndex, allocate: bool) -> Option<&mut TsdfVoxel> {
        let (block_index, local) = index.split(self.voxels_per_side);
        let block = if allocate {
            self.allocate_block(block_index)
        } else {
            self.blocks.get_mut(&block_index)?
        };
        block.mark_updated();
        Some(block.voxel_mut(local))
    }

    /// Remove one block. Returns true if it existed.
    pub fn remove_block(&mut self, index: &BlockIndex) -> bool {
        self.blocks.remove(index).is_some()
    }

    /// Remove every block.
    pub fn remove_all_blocks(&mut self) {
        self.blocks.clear();
    }

    /// Remove blocks whose center is farther than `max_distance` from `center`.
    ///
    /// Returns the number of removed blocks.
    pub fn remove_distant_blocks(&mut self, center: &Point, max_distance: f32) -> usize {
        let before = self.blocks.len();
        self.blocks
            .retain(|_, block| (block.center() - center).norm() <= max_distance);
        before - self.blocks.len()
    }

    /// Indices of blocks whose flag for `kind` is set.
    pub fn updated_blocks(&self, kind: UpdateKind) -> Vec<BlockIndex> {
        self.blocks
            .iter()
            .filter(|(_, b)| b.is_updated(kind))
            .map(|(i, _)| *i)
            .collect()
    }

    /// Clear the flag for `kind` on every block.
    pub fn clear_updated(&mut self, kind: UpdateKind) {
        for block in self.blocks.values_mut() {
            block.set_updated(kind, false);
        }
    }

    /// Insert an externally built block.
    pub fn insert_block(&mut self, block: Block, strategy: BlockMergingStrategy) -> Result<(), LayerError> {
        if block.voxels_per_side() != self.voxels_per_side
            || (block.voxel_size() - self.voxel_size).abs() > f32::EPSILON * self.voxel_size.max(1.0)
        {
            return Err(LayerError::GeometryMismatch {
                index: block.index(),
                voxel_size: block.voxel_size(),
                voxels_per_side: block.voxels_per_side(),
                layer_voxel_size: self.voxel_size,
                layer_voxels_per_side: self.voxels_per_side,
            });
        }

        let index = block.index();
        match self.blocks.get_mut(&index) {
            Some(existing) => match strategy {
                BlockMergingStrategy::Prohibit => return Err(LayerError::BlockExists(index)),
                BlockMergingStrategy::Discard => {}
                BlockMergingStrategy::Merge => existing.merge(&block),
                BlockMergingStrategy::Replace => {
                    *existing = block;
                    existing.mark_updated();
                }
            },
            None => {
                let mut block = block;
                block.mark_updated();
                self.blocks.insert(index, block);
            }
        }
        Ok(())
    }

    /// Trilinear interpolation of the distance field.
    ///
    /// Needs all eight surrounding voxels observed above `min_weight`.
    pub fn interpolate_distance(&self, point: &Point, min_weight: f32) -> Option<f32> {
        let scaled = point / self.voxel_size - Point::repeat(0.5);
        let base = VoxelIndex::new(
            scaled.x.floor() as i32,
            scaled.y.floor() as i32,
            scaled.z.floor() as i32,
        );
        let frac = Vector3::new(
            scaled.x - base.x as f32,
            scaled.y - base.y as f32,
            scaled.z - base.z as f32,
        );

        let mut distance = 0.0;
        for corner in 0..8 {
            let offset = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let index = VoxelIndex::new(
                base.x + offset[0] as i32,
                base.y + offset[1] as i32,
                base.z + offset[2] as i32,
            );
            let voxel = self.voxel(index)?;
            if voxel.weight <= min_weight {
                return None;
            }
            let mut w = 1.0;
            for axis in 0..3 {
                w *= if offset[axis] == 1 { frac[axis] } else { 1.0 - frac[axis] };
            }
            distance += w * voxel.distance;
        }
        Some(distance)
    }

    /// Central-difference gradient of the interpolated distance field.
    pub fn distance_gradient(&self, point: &Point, min_weight: f32) -> Option<Vector3<f32>> {
        let h = self.voxel_size;
        let mut gradient = Vector3::zeros();
        for axis in 0..3 {
            let mut step = Vector3::zeros();
            step[axis] = h;
            let ahead = self.interpolate_distance(&(point + step), min_weight)?;
            let behind = self.interpolate_distance(&(point - step), min_weight)?;
            gradient[axis] = (ahead - behind) / (2.0 * h);
        }
        Some(gradient)
    }
}
