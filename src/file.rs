//! Pack orchestration: open, lookup, load, close.
//!
//! A [`PackFile`] owns the pack byte source and the parsed header and
//! index. Construction parses the preamble and then the companion index;
//! both are immutable afterwards. The index byte source lives only inside
//! construction — on every early error return ownership drops whatever
//! was already opened, so a failed open never leaks a handle.

use std::path::Path;

use crate::entry::{read_entry_header, EntryHeader};
use crate::errors::PackError;
use crate::header::PackHeader;
use crate::index::PackIndex;
use crate::loader::PackedObjectLoader;
use crate::object_id::ObjectId;
use crate::source::{ByteSource, MmapSource};

/// Decode caps for object loading.
///
/// `max_object_bytes` bounds any single inflated payload and any
/// reconstructed delta result. `max_delta_depth` counts delta edges; a
/// value of 0 rejects any delta entry.
#[derive(Clone, Copy, Debug)]
pub struct PackLimits {
    /// Maximum inflated or reconstructed object size.
    pub max_object_bytes: usize,
    /// Maximum delta edges on one chain.
    pub max_delta_depth: u8,
}

impl Default for PackLimits {
    fn default() -> Self {
        Self {
            max_object_bytes: 512 * 1024 * 1024,
            max_delta_depth: 64,
        }
    }
}

/// An opened pack with its parsed index.
///
/// Lookups and loads take `&self`; the handle is single-owner and holds
/// no interior mutability, so concurrent read-only use is safe whenever
/// the byte source supports concurrent positioned reads.
#[derive(Debug)]
pub struct PackFile<S: ByteSource> {
    source: S,
    header: PackHeader,
    index: PackIndex,
    limits: PackLimits,
}

impl PackFile<MmapSource> {
    /// Opens `path` and its companion index (`path` with an `idx`
    /// extension), both memory-mapped.
    pub fn open(path: &Path) -> Result<Self, PackError> {
        Self::open_with_limits(path, PackLimits::default())
    }

    /// [`open`](Self::open) with explicit decode caps.
    pub fn open_with_limits(path: &Path, limits: PackLimits) -> Result<Self, PackError> {
        let pack = MmapSource::open(path)?;
        let index = MmapSource::open(&path.with_extension("idx"))?;
        Self::from_sources_with_limits(pack, index, limits)
    }
}

impl<S: ByteSource> PackFile<S> {
    /// Builds a pack handle from explicit byte sources.
    ///
    /// The index source is consumed transiently: its contents are copied
    /// during parsing and it is released when this returns. On any parse
    /// error the pack source is released too before the error propagates.
    pub fn from_sources<I: ByteSource>(pack: S, index: I) -> Result<Self, PackError> {
        Self::from_sources_with_limits(pack, index, PackLimits::default())
    }

    /// [`from_sources`](Self::from_sources) with explicit decode caps.
    pub fn from_sources_with_limits<I: ByteSource>(
        pack: S,
        index: I,
        limits: PackLimits,
    ) -> Result<Self, PackError> {
        let header = PackHeader::parse(&pack)?;
        let index = PackIndex::parse(&index)?;
        Ok(Self {
            source: pack,
            header,
            index,
            limits,
        })
    }

    /// The parsed pack preamble.
    #[inline]
    #[must_use]
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// The parsed index.
    #[inline]
    #[must_use]
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Number of objects addressable through the index.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.index.object_count()
    }

    /// The configured decode caps.
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &PackLimits {
        &self.limits
    }

    /// True if `id` is present in this pack.
    ///
    /// Only the index is consulted; the pack payload is never touched.
    #[must_use]
    pub fn has_object(&self, id: &ObjectId) -> bool {
        self.index.contains(id)
    }

    /// Looks up `id` and classifies its entry.
    ///
    /// A miss returns `Ok(None)` without reading any pack payload. On a
    /// hit the entry header at the indexed offset is read once and the
    /// returned loader is bound to that offset and to `id`.
    pub fn get(&self, id: &ObjectId) -> Result<Option<PackedObjectLoader<'_, S>>, PackError> {
        let Some(offset) = self.index.lookup(id) else {
            return Ok(None);
        };
        let header = read_entry_header(&self.source, offset)?;
        Ok(Some(PackedObjectLoader::new(self, *id, offset, header)))
    }

    /// Releases the pack byte source.
    ///
    /// Dropping the handle releases it too; this form just makes the
    /// hand-back explicit at call sites.
    pub fn close(self) {}

    /// The pack byte source, for chain walks within this pack.
    #[inline]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Inflates the payload described by `header`, enforcing the object
    /// size cap.
    pub(crate) fn read_payload(&self, header: &EntryHeader) -> Result<Vec<u8>, PackError> {
        if header.size > self.limits.max_object_bytes as u64 {
            return Err(PackError::ObjectTooLarge {
                size: header.size,
                max: self.limits.max_object_bytes,
            });
        }
        let bytes = self
            .source
            .read_inflated_at(header.payload_offset, header.size as usize)?;
        Ok(bytes)
    }
}
