//! Error types for file formats and persistence.

use std::path::PathBuf;

use thiserror::Error;

use crate::tsdf::LayerError;

/// Encoding or decoding failure.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Reading or writing the underlying file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Postcard could not encode or decode the payload
    #[error("serialization error: {0}")]
    Serialize(#[from] postcard::Error),

    /// The file does not start with the expected magic bytes
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Magic for this file kind
        expected: [u8; 4],
        /// Magic found in the file
        found: [u8; 4],
    },

    /// The file was written by an incompatible version
    #[error("unsupported version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version this build reads
        expected: u16,
        /// Version found in the file
        found: u16,
    },

    /// The serialized layer does not fit the target layer
    #[error("layer geometry mismatch: message has voxel_size {message_voxel_size} / {message_voxels_per_side} per side, layer has {layer_voxel_size} / {layer_voxels_per_side}")]
    GeometryMismatch {
        /// Voxel size in the message
        message_voxel_size: f32,
        /// Voxels per side in the message
        message_voxels_per_side: usize,
        /// Voxel size of the layer
        layer_voxel_size: f32,
        /// Voxels per side of the layer
        layer_voxels_per_side: usize,
    },

    /// A block record has the wrong number of voxels
    #[error("block {index:?} has {found} voxels, expected {expected}")]
    BlockSize {
        /// Offending block
        index: crate::tsdf::BlockIndex,
        /// Voxels required by the geometry
        expected: usize,
        /// Voxels in the record
        found: usize,
    },

    /// Inserting a decoded block failed
    #[error(transparent)]
    Layer(#[from] LayerError),
}

/// Failure while writing a finished submap to disk.
#[derive(Error, Debug)]
pub enum PersistError {
    /// A directory component could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        /// Directory that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// A path component contains bytes outside printable ASCII
    #[error("path component {0:?} contains non-printable or non-ASCII characters")]
    InvalidComponent(String),

    /// Writing the map file failed
    #[error("failed to write map {path}: {source}")]
    Map {
        /// Target file
        path: PathBuf,
        /// Underlying error
        source: FormatError,
    },

    /// Writing the trajectory file failed
    #[error("failed to write trajectory {path}: {source}")]
    Trajectory {
        /// Target file
        path: PathBuf,
        /// Underlying error
        source: FormatError,
    },
}
