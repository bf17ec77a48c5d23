//! Control surface of the server.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::io::{FormatError, PersistError};

/// Operator requests handled between messages.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerCommand {
    /// Wipe map, mesh and window, and tell map consumers to reset.
    ClearMap,
    /// Re-extract the whole mesh, publish it and export it if configured.
    GenerateMesh,
    /// Write the map to a file.
    SaveMap(PathBuf),
    /// Load a map file, replacing colliding blocks.
    LoadMap(PathBuf),
    /// Publish every visualization cloud now.
    PublishPointclouds,
    /// Publish an incremental map snapshot now.
    PublishMap,
}

/// Errors surfaced to callers of the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration could not be used
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A map or trajectory file could not be read or written
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A submap could not be persisted
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Mesh export failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The event loop is gone
    #[error("server event loop disconnected")]
    Disconnected,

    /// No reply within the allowed time
    #[error("server command timed out")]
    Timeout,
}

/// Result of a [`ServerCommand`].
pub type CommandResult = Result<(), ServerError>;
