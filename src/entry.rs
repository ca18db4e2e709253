//! Object classification: entry headers and their tagged kinds.
//!
//! Every stored object begins with a variable-length type+size header.
//! Whole objects (commit, tree, blob, tag) are followed directly by their
//! compressed payload. Delta objects carry a base reference first: an
//! offset-delta encodes a backward distance to a base in the same pack,
//! a ref-delta names its base by a literal 20-byte id. Classification
//! reads the header once and yields an [`EntryKind`]; it never touches
//! the payload.

use crate::errors::{FormatError, PackError};
use crate::header::PACK_HEADER_SIZE;
use crate::object_id::ObjectId;
use crate::source::ByteSource;
use crate::varint::{decode_back_offset, decode_size_header};

/// Pack trailer checksum length, excluded from the data region.
const PACK_TRAILER_LEN: u64 = 20;

/// Scratch window for header decoding: a size varint (≤ 10 bytes) plus a
/// back-offset varint (≤ 10 bytes) always fit.
const HEADER_SCRATCH_LEN: usize = 32;

/// Type code for commit objects.
const OBJ_COMMIT: u8 = 1;
/// Type code for tree objects.
const OBJ_TREE: u8 = 2;
/// Type code for blob objects.
const OBJ_BLOB: u8 = 3;
/// Type code for tag objects.
const OBJ_TAG: u8 = 4;
/// Type code for offset-delta objects.
const OBJ_OFS_DELTA: u8 = 6;
/// Type code for ref-delta objects.
const OBJ_REF_DELTA: u8 = 7;

/// Kind of a whole (non-delta) object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

/// Tagged classification of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Whole object; the payload inflates directly to the object bytes.
    Whole { kind: ObjectKind },
    /// Delta against a base earlier in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta against a base named by id, possibly outside this pack.
    RefDelta { base_id: ObjectId },
}

/// Parsed entry header.
///
/// For delta entries `size` is the inflated patch size, not the size of
/// the reconstructed object; the patch stream itself declares base and
/// result sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    /// Tagged object classification.
    pub kind: EntryKind,
    /// Declared inflated payload size.
    pub size: u64,
    /// Offset where the compressed payload begins.
    pub payload_offset: u64,
}

/// Reads and classifies the object header at `offset`.
///
/// `offset` must point at an object header inside the pack's data region:
/// past the 12-byte preamble and before the trailing checksum.
///
/// # Errors
/// `FormatError::OffsetOutOfRange` for offsets outside the data region,
/// `FormatError::OfsUnderflow` when a back-offset reaches before the pack
/// start, `FormatError::BadObjectType` for unknown type codes, and
/// truncation/length errors from the varint decoders.
pub fn read_entry_header<S: ByteSource>(
    source: &S,
    offset: u64,
) -> Result<EntryHeader, PackError> {
    let data_end = source.len().saturating_sub(PACK_TRAILER_LEN);
    if offset < PACK_HEADER_SIZE || offset >= data_end {
        return Err(FormatError::OffsetOutOfRange(offset).into());
    }

    // Headers near the end of the data region are shorter than the
    // scratch window; clamp to what is actually readable.
    let avail = (source.len() - offset).min(HEADER_SCRATCH_LEN as u64) as usize;
    let mut scratch = [0u8; HEADER_SCRATCH_LEN];
    source.read_exact_at(offset, &mut scratch[..avail])?;

    let header = decode_size_header(&scratch[..avail])?;
    let mut consumed = header.len as u64;

    let kind = match header.type_code {
        OBJ_COMMIT => EntryKind::Whole {
            kind: ObjectKind::Commit,
        },
        OBJ_TREE => EntryKind::Whole {
            kind: ObjectKind::Tree,
        },
        OBJ_BLOB => EntryKind::Whole {
            kind: ObjectKind::Blob,
        },
        OBJ_TAG => EntryKind::Whole {
            kind: ObjectKind::Tag,
        },
        OBJ_OFS_DELTA => {
            let (back, len) = decode_back_offset(&scratch[header.len..avail])?;
            if back >= offset {
                return Err(FormatError::OfsUnderflow { offset, back }.into());
            }
            consumed += len as u64;
            EntryKind::OfsDelta {
                base_offset: offset - back,
            }
        }
        OBJ_REF_DELTA => {
            let id_start = offset + consumed;
            if id_start + ObjectId::LEN as u64 > data_end {
                return Err(FormatError::Truncated.into());
            }
            let mut id_bytes = [0u8; ObjectId::LEN];
            source.read_exact_at(id_start, &mut id_bytes)?;
            consumed += ObjectId::LEN as u64;
            EntryKind::RefDelta {
                base_id: ObjectId::from_bytes(id_bytes),
            }
        }
        code => return Err(FormatError::BadObjectType(code).into()),
    };

    Ok(EntryHeader {
        kind,
        size: header.size,
        payload_offset: offset + consumed,
    })
}
