//! Mesh layer and surface extraction.
//!
//! The mesh layer mirrors the block grid of the TSDF: each block owns one
//! mesh cell. Extraction is incremental, only blocks flagged
//! [`UpdateKind::Mesh`] are re-extracted unless a full pass is requested.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::MeshConfig;
use crate::core::{Color, Point};

use super::block::UpdateKind;
use super::layer::TsdfLayer;
use super::voxel::BlockIndex;

/// Surface geometry of one block.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions in the world frame
    pub vertices: Vec<Point>,
    /// One color per vertex
    pub colors: Vec<Color>,
    /// Changed since it was last published
    pub updated: bool,
}

impl Mesh {
    /// Drop all geometry.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.colors.clear();
    }

    /// True if the mesh has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// One block of a published mesh update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshBlock {
    /// Block index
    pub index: BlockIndex,
    /// Vertex positions (empty means "remove this block")
    pub vertices: Vec<Point>,
    /// Vertex colors
    pub colors: Vec<Color>,
}

/// Incremental mesh update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshMessage {
    /// Changed blocks
    pub blocks: Vec<MeshBlock>,
}

/// Per-block meshes.
#[derive(Clone, Debug)]
pub struct MeshLayer {
    block_size: f32,
    meshes: HashMap<BlockIndex, Mesh>,
}

impl MeshLayer {
    /// Create an empty mesh layer matching a TSDF block size.
    pub fn new(block_size: f32) -> Self {
        Self {
            block_size,
            meshes: HashMap::new(),
        }
    }

    /// Whether a cell exists for a block.
    pub fn has_mesh(&self, index: &BlockIndex) -> bool {
        self.meshes.contains_key(index)
    }

    /// Mesh cell by index.
    pub fn mesh(&self, index: &BlockIndex) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    /// Mutable mesh cell by index.
    pub fn mesh_mut(&mut self, index: &BlockIndex) -> Option<&mut Mesh> {
        self.meshes.get_mut(index)
    }

    /// Get or create a mesh cell.
    pub fn allocate_mesh(&mut self, index: BlockIndex) -> &mut Mesh {
        self.meshes.entry(index).or_default()
    }

    /// Number of mesh cells.
    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Total vertex count.
    pub fn num_vertices(&self) -> usize {
        self.meshes.values().map(|m| m.vertices.len()).sum()
    }

    /// All cells in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockIndex, &Mesh)> {
        self.meshes.iter()
    }

    /// Remove every cell.
    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    /// Remove cells whose block center is farther than `max_distance`.
    pub fn clear_distant_mesh(&mut self, center: &Point, max_distance: f32) {
        let half = 0.5 * self.block_size;
        let block_size = self.block_size;
        self.meshes.retain(|index, _| {
            let block_center = Point::new(index.x as f32, index.y as f32, index.z as f32) * block_size
                + Point::repeat(half);
            (block_center - center).norm() <= max_distance
        });
    }

    /// Collect cells flagged `updated` and clear their flag.
    pub fn take_updated(&mut self) -> MeshMessage {
        let mut blocks: Vec<MeshBlock> = self
            .meshes
            .iter_mut()
            .filter(|(_, mesh)| mesh.updated)
            .map(|(index, mesh)| {
                mesh.updated = false;
                MeshBlock {
                    index: *index,
                    vertices: mesh.vertices.clone(),
                    colors: mesh.colors.clone(),
                }
            })
            .collect();
        blocks.sort_by_key(|b| b.index);
        MeshMessage { blocks }
    }
}

/// Turns TSDF blocks into mesh cells.
pub trait MeshExtractor: Send {
    /// Re-extract meshes.
    ///
    /// With `only_updated` only blocks flagged [`UpdateKind::Mesh`] are
    /// processed. With `clear_updated_flag` those flags are reset.
    fn generate_mesh(
        &mut self,
        layer: &mut TsdfLayer,
        mesh_layer: &mut MeshLayer,
        only_updated: bool,
        clear_updated_flag: bool,
    );
}

/// Emits the voxel centers that lie on the zero crossing.
///
/// A point-based surface, cheap enough to refresh every timer tick.
#[derive(Clone, Debug)]
pub struct SurfaceMesher {
    config: MeshConfig,
}

impl SurfaceMesher {
    /// Create with the given parameters.
    pub fn new(config: MeshConfig) -> Self {
        Self { config }
    }
}

impl MeshExtractor for SurfaceMesher {
    fn generate_mesh(
        &mut self,
        layer: &mut TsdfLayer,
        mesh_layer: &mut MeshLayer,
        only_updated: bool,
        clear_updated_flag: bool,
    ) {
        let indices = if only_updated {
            layer.updated_blocks(UpdateKind::Mesh)
        } else {
            layer.block_indices()
        };
        let threshold = self.config.surface_distance_factor * layer.voxel_size();

        for index in indices {
            let Some(block) = layer.block_mut(&index) else {
                continue;
            };
            let mesh = mesh_layer.allocate_mesh(index);
            mesh.clear();
            for (linear, voxel) in block.voxels().iter().enumerate() {
                if voxel.weight > self.config.min_weight && voxel.distance.abs() < threshold {
                    mesh.vertices.push(block.voxel_center(linear));
                    mesh.colors.push(voxel.color);
                }
            }
            mesh.updated = true;
            if clear_updated_flag {
                block.set_updated(UpdateKind::Mesh, false);
            }
        }
    }
}
