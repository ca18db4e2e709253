//! Pack index parsing and id → offset lookup.
//!
//! The fan-out index layout is: 256 big-endian u32 cumulative counts
//! (1024 bytes), then `count[255]` records of 24 bytes each — a big-endian
//! u32 pack offset followed by a 20-byte id — globally sorted by id, then
//! two 20-byte trailing checksums. Bucket `k` holds the records whose id's
//! first byte equals `k`; its record count is `count[k] - count[k-1]`.
//!
//! # Scope
//! - Validates fan-out monotonicity and total file length.
//! - Copies non-empty buckets into memory; empty buckets stay unallocated,
//!   so lookups in them touch no index bytes.
//! - Does **not** validate the trailing checksums, and trusts per-bucket
//!   record order (records are sorted by the producer).
//!
//! # Complexity
//! Lookup is O(1) bucket selection plus O(log n) binary search within the
//! bucket.

use crate::errors::{CorruptIndexError, CorruptIndexKind, PackError};
use crate::object_id::ObjectId;
use crate::source::ByteSource;

/// Fan-out entries, one per possible first byte.
const FANOUT_ENTRIES: usize = 256;

/// Fan-out table size in bytes.
const FANOUT_SIZE: u64 = (FANOUT_ENTRIES * 4) as u64;

/// Record stride: u32 offset + 20-byte id.
const RECORD_LEN: usize = 4 + ObjectId::LEN;

/// Trailer: pack checksum + index checksum, 20 bytes each.
const TRAILER_LEN: u64 = 40;

/// Magic of the versioned index layout, which this parser rejects.
const VERSIONED_IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];

/// Parsed pack index.
///
/// Immutable after parse; concurrent lookups need no locking.
///
/// # Invariants
/// - `buckets[k]` is `None` exactly when bucket `k` is empty.
/// - Every allocated bucket's length is a multiple of [`RECORD_LEN`] and
///   its records are sorted by id.
#[derive(Debug)]
pub struct PackIndex {
    buckets: Vec<Option<Box<[u8]>>>,
    object_count: u32,
}

impl PackIndex {
    /// Parses a fan-out index from its byte source.
    ///
    /// Non-empty buckets are copied out of the source; the source is not
    /// needed after this returns.
    ///
    /// # Errors
    /// `CorruptIndexError` (naming `source.name()`) on a versioned-layout
    /// magic, a non-monotonic fan-out, or a file-length mismatch; source
    /// errors propagate unchanged.
    pub fn parse<S: ByteSource>(source: &S) -> Result<Self, PackError> {
        let corrupt = |kind| {
            PackError::CorruptIndex(CorruptIndexError {
                name: source.name().to_string(),
                kind,
            })
        };

        // Shortest well-formed index: fan-out table + trailer, no records.
        if source.len() < FANOUT_SIZE + TRAILER_LEN {
            return Err(corrupt(CorruptIndexKind::LengthMismatch {
                expected: FANOUT_SIZE + TRAILER_LEN,
                actual: source.len(),
            }));
        }

        let mut fanout_bytes = [0u8; FANOUT_SIZE as usize];
        source.read_exact_at(0, &mut fanout_bytes)?;

        if fanout_bytes[0..4] == VERSIONED_IDX_MAGIC {
            return Err(corrupt(CorruptIndexKind::VersionedLayout));
        }

        let mut counts = [0u32; FANOUT_ENTRIES];
        let mut prev = 0u32;
        for (bucket, chunk) in fanout_bytes.chunks_exact(4).enumerate() {
            let count = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if count < prev {
                return Err(corrupt(CorruptIndexKind::NonMonotonicFanout { bucket }));
            }
            counts[bucket] = count;
            prev = count;
        }

        let object_count = counts[FANOUT_ENTRIES - 1];
        let expected = FANOUT_SIZE + RECORD_LEN as u64 * u64::from(object_count) + TRAILER_LEN;
        if source.len() != expected {
            return Err(corrupt(CorruptIndexKind::LengthMismatch {
                expected,
                actual: source.len(),
            }));
        }

        let mut buckets = Vec::with_capacity(FANOUT_ENTRIES);
        for bucket in 0..FANOUT_ENTRIES {
            let lo = if bucket == 0 { 0 } else { counts[bucket - 1] };
            let hi = counts[bucket];
            let records = (hi - lo) as usize;
            if records == 0 {
                buckets.push(None);
                continue;
            }

            let start = FANOUT_SIZE + RECORD_LEN as u64 * u64::from(lo);
            let mut data = vec![0u8; records * RECORD_LEN];
            source.read_exact_at(start, &mut data)?;
            buckets.push(Some(data.into_boxed_slice()));
        }

        Ok(Self {
            buckets,
            object_count,
        })
    }

    /// Number of objects addressable through this index.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// True if `id` is present.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.lookup(id).is_some()
    }

    /// Looks up the pack offset for `id`.
    ///
    /// Returns `None` on a miss; a miss is a normal result, not an error.
    #[must_use]
    pub fn lookup(&self, id: &ObjectId) -> Option<u64> {
        let data = self.buckets[id.first_byte() as usize].as_deref()?;

        let mut low = 0usize;
        let mut high = data.len() / RECORD_LEN;
        while low < high {
            let mid = (low + high) / 2;
            let record = &data[mid * RECORD_LEN..(mid + 1) * RECORD_LEN];
            match id.as_bytes()[..].cmp(&record[4..]) {
                std::cmp::Ordering::Less => high = mid,
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Equal => {
                    let offset = u32::from_be_bytes([record[0], record[1], record[2], record[3]]);
                    return Some(u64::from(offset));
                }
            }
        }
        None
    }
}
