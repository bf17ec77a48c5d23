//! Volumetric map: TSDF storage, fusion engines, meshing and views.
//!
//! - [`TsdfLayer`]: sparse hash of [`Block`]s of [`TsdfVoxel`]s
//! - [`FusionEngine`]: forward and backward fusion of point clouds
//! - [`MeshLayer`] / [`MeshExtractor`]: incremental surface extraction
//! - [`visualization`]: point views for debugging consumers

mod block;
mod integrator;
mod layer;
mod mesh;
mod raycaster;
mod voxel;

pub mod visualization;

pub use block::{Block, UpdateKind};
pub use integrator::{FusionEngine, IntegratorMethod, MergedIntegrator, SimpleIntegrator, create_engine};
pub use layer::{BlockMergingStrategy, LayerError, TsdfLayer};
pub use mesh::{Mesh, MeshBlock, MeshExtractor, MeshLayer, MeshMessage, SurfaceMesher};
pub use raycaster::VoxelRay;
pub use voxel::{BlockIndex, TsdfVoxel, VoxelIndex, WEIGHT_EPSILON};
