//! File formats and persistence.
//!
//! Every file starts with a 4-byte magic and a little-endian `u16` version,
//! followed by a postcard payload:
//!
//! | File            | Magic  | Payload                         |
//! |-----------------|--------|---------------------------------|
//! | map `.tsdf`     | `VTSD` | [`LayerMessage`]                |
//! | trajectory      | `VTRJ` | [`TrajectoryFile`]              |
//! | recording       | `VREC` | length-prefixed [`RecordedEvent`]s |
//!
//! Meshes are exported as ASCII PLY.

mod error;
mod header;
mod layer_format;
mod ply;
mod recording;
mod submap_writer;
mod trajectory;

pub use error::{FormatError, PersistError};
pub use header::{FileKind, HEADER_SIZE};
pub use layer_format::{
    BlockRecord, LAYER_FILE, LayerMessage, MapAction, deserialize_into_layer, layer_from_file, load_layer,
    read_layer_file, save_layer, serialize_layer,
};
pub use ply::write_mesh_ply;
pub use recording::{RECORDING_FILE, RecordedEvent, RecordingReader, RecordingWriter};
pub use submap_writer::{MAP_FILE_NAME, TRAJECTORY_FILE_NAME, create_path, save_submap, submap_directory};
pub use trajectory::{StampedPose, TRAJECTORY_FILE, TrajectoryFile};
