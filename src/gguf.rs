//! GGUF stub header
//!
//! Benchmark runs use placeholder model files that carry only the fixed
//! GGUF preamble and no payload:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "GGUF" (0x46554747 little-endian)
//! 4       4     version        u32 LE
//! 8       8     tensor_count   u64 LE
//! 16      8     kv_count       u64 LE
//! ```
//!
//! Readers check the magic before trusting any other field.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SparsimError};

/// GGUF magic number: "GGUF" read as a little-endian u32
pub const GGUF_MAGIC: u32 = 0x4655_4747;

/// Version written by [`GgufHeader::dummy`]
pub const GGUF_VERSION_V3: u32 = 3;

/// Encoded size of the header
pub const HEADER_LEN: usize = 24;

/// Fixed preamble of a GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GgufHeader {
    /// Format version
    pub version: u32,
    /// Number of tensors in the file
    pub tensor_count: u64,
    /// Number of metadata key-value pairs
    pub kv_count: u64,
}

impl GgufHeader {
    /// Placeholder header: v3, 10 tensors, no metadata
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            version: GGUF_VERSION_V3,
            tensor_count: 10,
            kv_count: 0,
        }
    }

    /// Encode as 24 little-endian bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&GGUF_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..16].copy_from_slice(&self.tensor_count.to_le_bytes());
        out[16..24].copy_from_slice(&self.kv_count.to_le_bytes());
        out
    }

    /// Decode the header at the start of `data`; trailing bytes are ignored
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the magic is wrong or `data` is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let magic = u32::from_le_bytes(read_array(&mut cursor, "magic")?);
        if magic != GGUF_MAGIC {
            return Err(SparsimError::FormatError {
                reason: format!("Invalid GGUF magic: 0x{magic:08X}, expected 0x{GGUF_MAGIC:08X}"),
            });
        }

        let version = u32::from_le_bytes(read_array(&mut cursor, "version")?);
        let tensor_count = u64::from_le_bytes(read_array(&mut cursor, "tensor_count")?);
        let kv_count = u64::from_le_bytes(read_array(&mut cursor, "kv_count")?);

        Ok(Self {
            version,
            tensor_count,
            kv_count,
        })
    }

    /// Read the header of a file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read, `FormatError` if it is
    /// not a GGUF file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut prefix = Vec::with_capacity(HEADER_LEN);
        fs::File::open(path)?
            .take(HEADER_LEN as u64)
            .read_to_end(&mut prefix)?;
        let header = Self::parse(&prefix)?;
        debug!(path = %path.display(), ?header, "gguf header read");
        Ok(header)
    }

    /// Write the header as a complete file, replacing any existing one
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes())?;
        debug!(path = %path.display(), header = ?self, "gguf header written");
        Ok(())
    }
}

impl Default for GgufHeader {
    fn default() -> Self {
        Self::dummy()
    }
}

fn read_array<const N: usize>(cursor: &mut Cursor<&[u8]>, field: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| SparsimError::FormatError {
            reason: format!("truncated GGUF header: missing {field}"),
        })?;
    Ok(buf)
}
