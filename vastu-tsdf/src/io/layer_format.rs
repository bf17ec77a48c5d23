//! Serialized TSDF layers, used for map files and remote map messages.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tsdf::{Block, BlockIndex, BlockMergingStrategy, TsdfLayer, TsdfVoxel, UpdateKind};

use super::error::FormatError;
use super::header::FileKind;

/// Map file framing (`.tsdf`).
pub const LAYER_FILE: FileKind = FileKind {
    magic: *b"VTSD",
    version: 1,
};

/// How the receiver applies a layer message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapAction {
    /// Overwrite colliding blocks
    #[default]
    Update,
    /// Merge colliding blocks voxel by voxel
    Merge,
    /// Clear the receiver's map first
    Reset,
}

/// One serialized block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Grid index
    pub index: BlockIndex,
    /// `voxels_per_side³` voxels in x-fastest order
    pub voxels: Vec<TsdfVoxel>,
}

/// A full or incremental layer snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerMessage {
    /// What the receiver should do with it
    pub action: MapAction,
    /// Voxel edge length in meters
    pub voxel_size: f32,
    /// Voxels along one block edge
    pub voxels_per_side: usize,
    /// Block payloads
    pub blocks: Vec<BlockRecord>,
}

impl LayerMessage {
    /// Number of blocks carried.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}

/// Snapshot a layer.
///
/// With `only_updated`, only blocks carrying the [`UpdateKind::Map`] flag are
/// included and their flag is cleared.
pub fn serialize_layer(layer: &mut TsdfLayer, only_updated: bool) -> LayerMessage {
    let mut indices = if only_updated {
        layer.updated_blocks(UpdateKind::Map)
    } else {
        layer.block_indices()
    };
    indices.sort();

    let mut blocks = Vec::with_capacity(indices.len());
    for index in indices {
        let Some(block) = layer.block_mut(&index) else {
            continue;
        };
        blocks.push(BlockRecord {
            index,
            voxels: block.voxels().to_vec(),
        });
        if only_updated {
            block.set_updated(UpdateKind::Map, false);
        }
    }

    LayerMessage {
        action: MapAction::Update,
        voxel_size: layer.voxel_size(),
        voxels_per_side: layer.voxels_per_side(),
        blocks,
    }
}

/// Check that a message fits the layer without touching it.
fn validate(message: &LayerMessage, layer: &TsdfLayer) -> Result<(), FormatError> {
    let size_matches = (message.voxel_size - layer.voxel_size()).abs() <= f32::EPSILON * layer.voxel_size().max(1.0);
    if !size_matches || message.voxels_per_side != layer.voxels_per_side() {
        return Err(FormatError::GeometryMismatch {
            message_voxel_size: message.voxel_size,
            message_voxels_per_side: message.voxels_per_side,
            layer_voxel_size: layer.voxel_size(),
            layer_voxels_per_side: layer.voxels_per_side(),
        });
    }
    let expected = layer.voxels_per_block();
    if let Some(record) = message.blocks.iter().find(|r| r.voxels.len() != expected) {
        return Err(FormatError::BlockSize {
            index: record.index,
            expected,
            found: record.voxels.len(),
        });
    }
    Ok(())
}

/// Apply a message to a layer according to its action.
///
/// The message is validated first, so a rejected message leaves the layer
/// unchanged.
pub fn deserialize_into_layer(message: LayerMessage, layer: &mut TsdfLayer) -> Result<(), FormatError> {
    validate(&message, layer)?;
    let strategy = match message.action {
        MapAction::Reset => {
            layer.remove_all_blocks();
            BlockMergingStrategy::Replace
        }
        MapAction::Update => BlockMergingStrategy::Replace,
        MapAction::Merge => BlockMergingStrategy::Merge,
    };
    insert_records(message, strategy, layer)
}

fn insert_records(
    message: LayerMessage,
    strategy: BlockMergingStrategy,
    layer: &mut TsdfLayer,
) -> Result<(), FormatError> {
    let voxels_per_side = layer.voxels_per_side();
    let voxel_size = layer.voxel_size();
    for record in message.blocks {
        let found = record.voxels.len();
        let block = Block::from_voxels(record.index, voxels_per_side, voxel_size, record.voxels).ok_or(
            FormatError::BlockSize {
                index: record.index,
                expected: layer.voxels_per_block(),
                found,
            },
        )?;
        layer.insert_block(block, strategy)?;
    }
    Ok(())
}

/// Write every block of a layer to a map file.
///
/// Update flags are left untouched.
pub fn save_layer(layer: &TsdfLayer, path: &Path) -> Result<(), FormatError> {
    let mut indices = layer.block_indices();
    indices.sort();
    let blocks = indices
        .into_iter()
        .filter_map(|index| {
            layer.block(&index).map(|block| BlockRecord {
                index,
                voxels: block.voxels().to_vec(),
            })
        })
        .collect();
    let message = LayerMessage {
        action: MapAction::Update,
        voxel_size: layer.voxel_size(),
        voxels_per_side: layer.voxels_per_side(),
        blocks,
    };
    LAYER_FILE.save(path, &message)
}

/// Read a map file.
pub fn read_layer_file(path: &Path) -> Result<LayerMessage, FormatError> {
    LAYER_FILE.load(path)
}

/// Load a map file into an existing layer using `strategy` on collisions.
///
/// Returns the number of blocks read.
pub fn load_layer(path: &Path, strategy: BlockMergingStrategy, layer: &mut TsdfLayer) -> Result<usize, FormatError> {
    let message = read_layer_file(path)?;
    validate(&message, layer)?;
    let count = message.num_blocks();
    insert_records(message, strategy, layer)?;
    Ok(count)
}

/// Build a fresh layer from a map file, taking its geometry from the file.
pub fn layer_from_file(path: &Path) -> Result<TsdfLayer, FormatError> {
    let message = read_layer_file(path)?;
    let mut layer = TsdfLayer::new(message.voxel_size, message.voxels_per_side);
    validate(&message, &layer)?;
    insert_records(message, BlockMergingStrategy::Prohibit, &mut layer)?;
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tsdf::VoxelIndex;

    fn layer() -> TsdfLayer {
        let mut layer = TsdfLayer::new(0.1, 4);
        for (i, x) in [0, 5, 9].into_iter().enumerate() {
            let voxel = layer.voxel_for_update(VoxelIndex::new(x, 0, 0), true).unwrap();
            voxel.distance = 0.05 * i as f32;
            voxel.weight = 1.0 + i as f32;
        }
        layer
    }

    #[test]
    fn test_only_updated_clears_map_flag() {
        let mut layer = layer();
        let message = serialize_layer(&mut layer, true);
        assert_eq!(message.num_blocks(), 3);
        assert!(layer.updated_blocks(UpdateKind::Map).is_empty());
        // Mesh flags belong to the mesher.
        assert_eq!(layer.updated_blocks(UpdateKind::Mesh).len(), 3);

        assert_eq!(serialize_layer(&mut layer, true).num_blocks(), 0);
        assert_eq!(serialize_layer(&mut layer, false).num_blocks(), 3);
    }

    #[test]
    fn test_deserialize_update_replaces() {
        let mut source = layer();
        let message = serialize_layer(&mut source, false);
        let mut target = TsdfLayer::new(0.1, 4);
        target.voxel_for_update(VoxelIndex::new(0, 0, 0), true).unwrap().weight = 50.0;

        deserialize_into_layer(message, &mut target).unwrap();
        assert_eq!(target.num_allocated_blocks(), 3);
        assert_eq!(target.voxel(VoxelIndex::new(0, 0, 0)).unwrap().weight, 1.0);
    }

    #[test]
    fn test_deserialize_reset_clears_first() {
        let mut source = layer();
        let mut message = serialize_layer(&mut source, false);
        message.blocks.truncate(1);
        message.action = MapAction::Reset;

        let mut target = layer();
        deserialize_into_layer(message, &mut target).unwrap();
        assert_eq!(target.num_allocated_blocks(), 1);
    }

    #[test]
    fn test_invalid_message_leaves_layer_unchanged() {
        let mut source = layer();
        let mut message = serialize_layer(&mut source, false);
        message.action = MapAction::Reset;
        message.blocks[2].voxels.pop();

        let mut target = layer();
        assert!(matches!(
            deserialize_into_layer(message, &mut target),
            Err(FormatError::BlockSize { expected: 64, found: 63, .. })
        ));
        assert_eq!(target.num_allocated_blocks(), 3);

        let wrong_geometry = LayerMessage {
            action: MapAction::Reset,
            voxel_size: 0.2,
            voxels_per_side: 4,
            blocks: Vec::new(),
        };
        assert!(matches!(
            deserialize_into_layer(wrong_geometry, &mut target),
            Err(FormatError::GeometryMismatch { .. })
        ));
        assert_eq!(target.num_allocated_blocks(), 3);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsdf");
        let source = layer();
        save_layer(&source, &path).unwrap();

        let loaded = layer_from_file(&path).unwrap();
        let mut expected = source.block_indices();
        let mut actual = loaded.block_indices();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);
        assert_eq!(loaded.voxel(VoxelIndex::new(9, 0, 0)).unwrap().weight, 3.0);

        let mut merged = layer();
        assert_eq!(load_layer(&path, BlockMergingStrategy::Merge, &mut merged).unwrap(), 3);
        assert_eq!(merged.voxel(VoxelIndex::new(9, 0, 0)).unwrap().weight, 6.0);
    }
}
