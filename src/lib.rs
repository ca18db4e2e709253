//! Reader for content-addressable object packs.
//!
//! A pack is a single file holding many zlib-compressed objects, some of
//! them stored as deltas against another object in the same pack (by
//! backward offset) or anywhere else (by object id). A companion index
//! file maps 20-byte object ids to pack offsets through a 256-way fan-out
//! table and per-bucket binary search.
//!
//! ## Scope
//! This crate parses pack and index headers, resolves id → offset lookups,
//! classifies stored objects, and loads them lazily, resolving delta
//! chains with explicit bounds. It does not write packs, transport them,
//! or repack.
//!
//! ## Key invariants
//! - Header and index are parsed once at open time and immutable after.
//! - All reads are positioned and bounded; decompression has hard output
//!   caps (`PackLimits`).
//! - Delta-chain resolution is an explicit loop with a visited-offset set
//!   and a depth cap, never unguarded call recursion.
//! - Loaders borrow the owning [`PackFile`] and cannot outlive it.
//!
//! ## Read flow (single object)
//! 1) `PackIndex::lookup` selects a fan-out bucket by the id's first byte
//!    and binary-searches the bucket's sorted records.
//! 2) `read_entry_header` decodes the variable-length type+size header at
//!    the found offset and yields a tagged [`EntryKind`].
//! 3) The loader inflates the payload; delta entries walk to their base
//!    (in-pack by offset, or through a caller-supplied [`BaseResolver`])
//!    and apply patches base-outward.
//!
//! ## Notable entry points
//! - [`PackFile`]: open / `has_object` / `get` / `close`.
//! - [`PackedObjectLoader`]: lazy per-object handle, `read` resolves.
//! - [`ByteSource`]: positioned-read collaborator; `MmapSource` for files,
//!   `BytesSource` for in-memory packs.

pub mod delta;
pub mod entry;
pub mod errors;
pub mod file;
pub mod header;
pub mod index;
pub mod inflate;
pub mod loader;
pub mod object_id;
pub mod source;
pub mod varint;

pub use delta::{apply_delta, delta_sizes, DeltaError};
pub use entry::{read_entry_header, EntryHeader, EntryKind, ObjectKind};
pub use errors::{CorruptIndexError, CorruptIndexKind, DeltaChainError, FormatError, PackError};
pub use file::{PackFile, PackLimits};
pub use header::PackHeader;
pub use index::PackIndex;
pub use inflate::InflateError;
pub use loader::{BaseResolver, NoExternalBases, PackedObject, PackedObjectLoader, ResolvedBase};
pub use object_id::ObjectId;
pub use source::{ByteSource, BytesSource, MmapSource, SourceError};
pub use varint::{decode_back_offset, decode_size_header, SizeHeader};
