//! Shared file framing.
//!
//! ```text
//! ┌───────────┬─────────────┬──────────────────────┐
//! │ magic [4] │ version u16 │ postcard payload ... │
//! └───────────┴─────────────┴──────────────────────┘
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::FormatError;

/// Bytes before the payload.
pub const HEADER_SIZE: usize = 6;

/// Identifies one file kind and its version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileKind {
    /// Leading magic bytes
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
}

impl FileKind {
    /// Write magic and version.
    pub fn write_header<W: Write>(&self, writer: &mut W) -> Result<(), FormatError> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        Ok(())
    }

    /// Read and check magic and version.
    pub fn read_header<R: Read>(&self, reader: &mut R) -> Result<(), FormatError> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let found = [header[0], header[1], header[2], header[3]];
        if found != self.magic {
            return Err(FormatError::BadMagic {
                expected: self.magic,
                found,
            });
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != self.version {
            return Err(FormatError::UnsupportedVersion {
                expected: self.version,
                found: version,
            });
        }
        Ok(())
    }

    /// Frame one value into a byte buffer.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, FormatError> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        self.write_header(&mut bytes)?;
        bytes.extend_from_slice(&postcard::to_allocvec(value)?);
        Ok(bytes)
    }

    /// Decode a framed value.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, FormatError> {
        let mut cursor = bytes;
        self.read_header(&mut cursor)?;
        Ok(postcard::from_bytes(cursor)?)
    }

    /// Write one framed value to a file.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), FormatError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&self.encode(value)?)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one framed value from a file.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T, FormatError> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        self.decode(&bytes)
    }
}
