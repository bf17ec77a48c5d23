//! Lazy removal of blocks emptied by deintegration.

use crate::tsdf::{MeshLayer, TsdfLayer, UpdateKind};

/// Tracks whether deintegration may have left empty blocks behind.
///
/// Deintegration only marks the map dirty. The pass over touched blocks runs
/// when a consumer is about to read the map.
#[derive(Clone, Debug, Default)]
pub struct MapPruner {
    needs_pruning: bool,
}

impl MapPruner {
    /// Create a clean pruner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that blocks may have been emptied.
    pub fn mark_dirty(&mut self) {
        self.needs_pruning = true;
    }

    /// Whether a pass is pending.
    pub fn needs_pruning(&self) -> bool {
        self.needs_pruning
    }

    /// Forget pending work (after the map was wiped).
    pub fn reset(&mut self) {
        self.needs_pruning = false;
    }

    /// Run a pass if the map is dirty. Returns the number of removed blocks.
    pub fn prune_if_needed(&mut self, layer: &mut TsdfLayer, mesh_layer: &mut MeshLayer) -> usize {
        if !self.needs_pruning {
            return 0;
        }
        let removed = prune_empty_blocks(layer, mesh_layer);
        self.needs_pruning = false;
        removed
    }
}

/// Remove map-updated blocks that hold no observed voxel.
///
/// The mesh cell of a removed block is emptied and flagged so the next mesh
/// message tells consumers to drop it.
pub fn prune_empty_blocks(layer: &mut TsdfLayer, mesh_layer: &mut MeshLayer) -> usize {
    let mut removed = 0;
    for index in layer.updated_blocks(UpdateKind::Map) {
        let empty = layer.block(&index).is_some_and(|block| !block.has_observed_voxels());
        if !empty {
            continue;
        }
        layer.remove_block(&index);
        removed += 1;
        if let Some(mesh) = mesh_layer.mesh_mut(&index) {
            mesh.clear();
            mesh.updated = true;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point;
    use crate::tsdf::{BlockIndex, VoxelIndex};

    fn layer_with_two_blocks() -> (TsdfLayer, MeshLayer) {
        let mut layer = TsdfLayer::new(0.1, 4);
        let kept = layer.voxel_for_update(VoxelIndex::new(0, 0, 0), true).unwrap();
        kept.distance = 0.01;
        kept.weight = 2.0;
        // Allocated, touched, but every weight is zero.
        layer.voxel_for_update(VoxelIndex::new(4, 0, 0), true).unwrap();
        let mut mesh_layer = MeshLayer::new(layer.block_size());
        mesh_layer.allocate_mesh(BlockIndex::new(1, 0, 0)).vertices.push(Point::zeros());
        (layer, mesh_layer)
    }

    #[test]
    fn test_clean_pruner_does_nothing() {
        let (mut layer, mut mesh_layer) = layer_with_two_blocks();
        let mut pruner = MapPruner::new();
        assert_eq!(pruner.prune_if_needed(&mut layer, &mut mesh_layer), 0);
        assert_eq!(layer.num_allocated_blocks(), 2);
    }

    #[test]
    fn test_dirty_pruner_removes_empty_blocks() {
        let (mut layer, mut mesh_layer) = layer_with_two_blocks();
        let mut pruner = MapPruner::new();
        pruner.mark_dirty();
        assert_eq!(pruner.prune_if_needed(&mut layer, &mut mesh_layer), 1);
        assert!(!pruner.needs_pruning());
        assert!(layer.has_block(&BlockIndex::new(0, 0, 0)));
        assert!(!layer.has_block(&BlockIndex::new(1, 0, 0)));

        let mesh = mesh_layer.mesh(&BlockIndex::new(1, 0, 0)).unwrap();
        assert!(mesh.is_empty());
        assert!(mesh.updated);
    }

    #[test]
    fn test_only_touched_blocks_are_checked() {
        let (mut layer, mut mesh_layer) = layer_with_two_blocks();
        layer.clear_updated(UpdateKind::Map);
        let mut pruner = MapPruner::new();
        pruner.mark_dirty();
        assert_eq!(pruner.prune_if_needed(&mut layer, &mut mesh_layer), 0);
        assert_eq!(layer.num_allocated_blocks(), 2);
        assert!(!pruner.needs_pruning());
    }
}
