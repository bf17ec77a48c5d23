//! # VastuTSDF
//!
//! Volumetric TSDF mapping server for a moving 3D sensor, with a sliding
//! window that forgets old observations and submaps written to disk.
//!
//! ## Overview
//!
//! Point clouds arrive stamped and expressed in the sensor frame. Each one
//! waits in a queue until its pose is known, is optionally refined against
//! the map, and is then fused into a block-sparse truncated signed distance
//! grid:
//!
//! ```text
//! PointcloudMessage ─► IngestQueue ─► PoseResolver ─► PoseRefiner (optional)
//!                                                          │
//!                                                          ▼
//!                  DeintegrationWindow ◄──── FusionEngine::integrate ───► TsdfLayer
//!                          │                                                 │
//!                  evict + deintegrate                          MapPruner / mesh / publish
//!                          │                                                 │
//!                          ▼                                                 ▼
//!                   SubmapLifecycle ──► submap folder (map + trajectory)   MapPublisher
//! ```
//!
//! ## Features
//!
//! - **Backward fusion**: clouds leaving the window are subtracted again, so
//!   the map only reflects recent data
//! - **Window bounds**: cloud count, time span and distance travelled, any
//!   combination, each optional
//! - **Submaps**: finished on time or distance, published and persisted as a
//!   map file plus the trajectory of the clouds in it
//! - **Pose refinement**: point-to-TSDF ICP with an optional accumulated
//!   correction
//! - **Map exchange**: incremental or reset snapshots, merged from peers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vastu_tsdf::{NullPublisher, ServerConfig, TransformBuffer, TsdfServer};
//!
//! let config = ServerConfig::load_default()?;
//! let resolver = TransformBuffer::new(config.server.transform_buffer_secs);
//! let mut server = TsdfServer::new(&config, resolver, NullPublisher)?;
//!
//! server.resolver_mut().insert("lidar", stamp, pose);
//! server.insert_pointcloud(cloud);
//! server.generate_mesh()?;
//! ```
//!
//! ## Coordinate System
//!
//! Poses are `T_G_C`: they map sensor-frame points into the world frame.
//! Block `(i, j, k)` covers `[i, i + 1) * block_size` along each axis.

#![warn(missing_docs)]

// Core types
pub mod core;

// TOML configuration
pub mod config;

// Voxel grid, fusion engines and meshing
pub mod tsdf;

// Message conversion, pose lookup and the ingest gate
pub mod ingest;

// Scan-to-map pose refinement
pub mod refine;

// Sliding-window deintegration
pub mod window;

// Removal of emptied blocks
pub mod pruner;

// Submap segmentation
pub mod submap;

// File formats and persistence
pub mod io;

// Orchestration, commands and the event loop
pub mod server;

pub use core::{Color, Observation, Point, Pointcloud, Threshold, Timestamp, Transform};

pub use config::{ConfigError, ServerConfig};

pub use tsdf::{BlockMergingStrategy, FusionEngine, MeshLayer, TsdfLayer, create_engine};

pub use ingest::{PointcloudMessage, PoseResolver, TransformBuffer};

pub use refine::{PoseRefiner, RefinementUpdate, TsdfIcp};

pub use window::{DeintegrationThresholds, DeintegrationWindow, WindowPacket};

pub use pruner::MapPruner;

pub use submap::{SubmapBundle, SubmapLifecycle, SubmapThresholds};

pub use io::{FormatError, LayerMessage, MapAction, PersistError, RecordedEvent, TrajectoryFile};

pub use server::{
    LogPublisher, MapPublisher, NullPublisher, ServerCommand, ServerError, ServerEvent, TsdfServer, run_event_loop,
};
