//! Pack preamble parsing.
//!
//! A pack begins with a fixed 12-byte preamble: 4-byte signature, 4-byte
//! big-endian version (2 or 3), 4-byte big-endian object count. The count
//! is stored for callers but not validated here; the index is the
//! authority on how many objects are addressable.

use crate::errors::{FormatError, PackError};
use crate::source::ByteSource;

/// Pack signature literal.
pub const PACK_SIGNATURE: [u8; 4] = *b"PACK";

/// Preamble size: signature(4) + version(4) + object count(4).
pub const PACK_HEADER_SIZE: u64 = 12;

/// Parsed pack preamble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackHeader {
    /// Pack format version, 2 or 3.
    pub version: u32,
    /// Declared number of objects in the pack.
    pub object_count: u32,
}

impl PackHeader {
    /// Reads and validates the 12-byte preamble from a pack source.
    ///
    /// # Errors
    /// `FormatError::NotAPack` on a signature mismatch,
    /// `FormatError::UnsupportedVersion` for versions other than 2 or 3,
    /// `FormatError::Truncated` if the source is shorter than the preamble.
    pub fn parse<S: ByteSource>(source: &S) -> Result<Self, PackError> {
        if source.len() < PACK_HEADER_SIZE {
            return Err(FormatError::Truncated.into());
        }

        let mut preamble = [0u8; PACK_HEADER_SIZE as usize];
        source.read_exact_at(0, &mut preamble)?;

        if preamble[0..4] != PACK_SIGNATURE {
            return Err(FormatError::NotAPack.into());
        }

        let version = u32::from_be_bytes([preamble[4], preamble[5], preamble[6], preamble[7]]);
        if version != 2 && version != 3 {
            return Err(FormatError::UnsupportedVersion(version).into());
        }

        let object_count =
            u32::from_be_bytes([preamble[8], preamble[9], preamble[10], preamble[11]]);

        Ok(Self {
            version,
            object_count,
        })
    }
}
