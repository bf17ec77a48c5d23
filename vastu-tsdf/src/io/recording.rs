//! Recorded sessions for offline replay.
//!
//! ```text
//! ┌────────────────────────────┐
//! │ "VREC" │ version u16       │
//! ├────────────────────────────┤
//! │ [len: u32 LE][postcard]    │  RecordedEvent
//! │ [len: u32 LE][postcard]    │
//! │ ...                        │
//! └────────────────────────────┘
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Timestamp, Transform};
use crate::ingest::PointcloudMessage;

use super::error::FormatError;
use super::header::FileKind;

/// Recording framing.
pub const RECORDING_FILE: FileKind = FileKind {
    magic: *b"VREC",
    version: 1,
};

/// One recorded input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordedEvent {
    /// Cloud from the main sensor stream
    Pointcloud(PointcloudMessage),
    /// Cloud from the freespace stream
    FreespacePointcloud(PointcloudMessage),
    /// Pose of `frame_id` in the world frame
    Pose {
        /// Child frame
        frame_id: String,
        /// Stamp of the pose
        timestamp: Timestamp,
        /// World-from-frame transform
        pose: Transform,
    },
}

impl RecordedEvent {
    /// Stamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            RecordedEvent::Pointcloud(msg) | RecordedEvent::FreespacePointcloud(msg) => msg.timestamp,
            RecordedEvent::Pose { timestamp, .. } => *timestamp,
        }
    }
}

/// Appends events to a recording file.
pub struct RecordingWriter {
    writer: BufWriter<File>,
    count: u64,
}

impl RecordingWriter {
    /// Create the file and write its header.
    pub fn create(path: &Path) -> Result<Self, FormatError> {
        let mut writer = BufWriter::new(File::create(path)?);
        RECORDING_FILE.write_header(&mut writer)?;
        Ok(Self { writer, count: 0 })
    }

    /// Append one event.
    pub fn record(&mut self, event: &RecordedEvent) -> Result<(), FormatError> {
        let bytes = postcard::to_allocvec(event)?;
        self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        self.count += 1;
        Ok(())
    }

    /// Events written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flush and close. Returns the event count.
    pub fn finish(mut self) -> Result<u64, FormatError> {
        self.writer.flush()?;
        Ok(self.count)
    }
}

/// Reads events back in file order.
pub struct RecordingReader {
    reader: BufReader<File>,
    done: bool,
}

impl RecordingReader {
    /// Open a recording and check its header.
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let mut reader = BufReader::new(File::open(path)?);
        RECORDING_FILE.read_header(&mut reader)?;
        Ok(Self { reader, done: false })
    }

    /// Next event, or `None` at a clean end of file.
    pub fn next_event(&mut self) -> Result<Option<RecordedEvent>, FormatError> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let mut payload = vec![0u8; u32::from_le_bytes(len) as usize];
        self.reader.read_exact(&mut payload)?;
        Ok(Some(postcard::from_bytes(&payload)?))
    }
}

impl Iterator for RecordingReader {
    type Item = Result<RecordedEvent, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
