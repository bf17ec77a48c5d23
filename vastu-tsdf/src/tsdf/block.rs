//! Fixed-size cube of voxels, the unit of allocation and removal.

use crate::core::Point;

use super::voxel::{BlockIndex, TsdfVoxel};

/// Consumers that track block changes independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// Map publishing and pruning
    Map,
    /// Mesh extraction
    Mesh,
}

/// A cube of `voxels_per_side³` voxels.
#[derive(Clone, Debug)]
pub struct Block {
    index: BlockIndex,
    voxels_per_side: usize,
    voxel_size: f32,
    voxels: Vec<TsdfVoxel>,
    updated_map: bool,
    updated_mesh: bool,
}

impl Block {
    /// Create an empty block.
    pub fn new(index: BlockIndex, voxels_per_side: usize, voxel_size: f32) -> Self {
        Self {
            index,
            voxels_per_side,
            voxel_size,
            voxels: vec![TsdfVoxel::default(); voxels_per_side.pow(3)],
            updated_map: false,
            updated_mesh: false,
        }
    }

    /// Rebuild a block from stored voxels.
    ///
    /// Returns `None` if the voxel count does not match the geometry.
    pub fn from_voxels(
        index: BlockIndex,
        voxels_per_side: usize,
        voxel_size: f32,
        voxels: Vec<TsdfVoxel>,
    ) -> Option<Self> {
        if voxels.len() != voxels_per_side.pow(3) {
            return None;
        }
        Some(Self {
            index,
            voxels_per_side,
            voxel_size,
            voxels,
            updated_map: true,
            updated_mesh: true,
        })
    }

    /// Grid index.
    pub fn index(&self) -> BlockIndex {
        self.index
    }

    /// Voxels along each edge.
    pub fn voxels_per_side(&self) -> usize {
        self.voxels_per_side
    }

    /// Voxel edge length in meters.
    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Block edge length in meters.
    pub fn block_size(&self) -> f32 {
        self.voxel_size * self.voxels_per_side as f32
    }

    /// Minimum corner in world coordinates.
    pub fn origin(&self) -> Point {
        Point::new(self.index.x as f32, self.index.y as f32, self.index.z as f32) * self.block_size()
    }

    /// Center in world coordinates.
    pub fn center(&self) -> Point {
        self.origin() + Point::repeat(0.5 * self.block_size())
    }

    /// Number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.voxels.len()
    }

    /// All voxels in linear order (x fastest).
    pub fn voxels(&self) -> &[TsdfVoxel] {
        &self.voxels
    }

    /// Linear index of a local voxel coordinate.
    #[inline]
    pub fn linear_index(&self, local: [usize; 3]) -> usize {
        local[0] + self.voxels_per_side * (local[1] + self.voxels_per_side * local[2])
    }

    /// Voxel by local coordinate.
    #[inline]
    pub fn voxel(&self, local: [usize; 3]) -> &TsdfVoxel {
        &self.voxels[self.linear_index(local)]
    }

    /// Mutable voxel by local coordinate.
    #[inline]
    pub fn voxel_mut(&mut self, local: [usize; 3]) -> &mut TsdfVoxel {
        let i = self.linear_index(local);
        &mut self.voxels[i]
    }

    /// Voxel by linear index.
    #[inline]
    pub fn voxel_by_linear_index(&self, linear: usize) -> &TsdfVoxel {
        &self.voxels[linear]
    }

    /// World position of a voxel center, by linear index.
    pub fn voxel_center(&self, linear: usize) -> Point {
        let n = self.voxels_per_side;
        let x = linear % n;
        let y = (linear / n) % n;
        let z = linear / (n * n);
        self.origin() + Point::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * self.voxel_size
    }

    /// True if any voxel carries a live contribution.
    pub fn has_observed_voxels(&self) -> bool {
        self.voxels.iter().any(TsdfVoxel::is_observed)
    }

    /// Whether the block changed since the consumer last cleared its flag.
    pub fn is_updated(&self, kind: UpdateKind) -> bool {
        match kind {
            UpdateKind::Map => self.updated_map,
            UpdateKind::Mesh => self.updated_mesh,
        }
    }

    /// Set or clear one update flag.
    pub fn set_updated(&mut self, kind: UpdateKind, value: bool) {
        match kind {
            UpdateKind::Map => self.updated_map = value,
            UpdateKind::Mesh => self.updated_mesh = value,
        }
    }

    /// Flag the block as changed for every consumer.
    pub fn mark_updated(&mut self) {
        self.updated_map = true;
        self.updated_mesh = true;
    }

    /// Voxel-wise weighted merge of another block with the same geometry.
    pub fn merge(&mut self, other: &Block) {
        for (mine, theirs) in self.voxels.iter_mut().zip(other.voxels.iter()) {
            mine.merge(theirs);
        }
        self.mark_updated();
    }
}
