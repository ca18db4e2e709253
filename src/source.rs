//! Positioned-read byte sources for pack and index files.
//!
//! [`ByteSource`] is the collaborator contract the reader consumes: bounded
//! positioned reads plus inflate-on-read. Implementations are immutable
//! after construction, so concurrent positioned reads are safe by
//! construction; release is `Drop`.
//!
//! Two implementations ship here: [`MmapSource`] memory-maps a file and
//! advises the kernel of sequential access, and [`BytesSource`] wraps an
//! owned buffer for in-memory packs and tests.

use std::fmt;
use std::fs::File;
use std::io;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;
use std::path::Path;

use memmap2::Mmap;

use crate::inflate::{inflate_exact, InflateError};

/// Errors from byte-source reads.
#[derive(Debug)]
#[non_exhaustive]
pub enum SourceError {
    /// Underlying file I/O failed.
    Io(io::Error),
    /// A read would run past the end of the source.
    OutOfRange {
        offset: u64,
        len: usize,
        source_len: u64,
    },
    /// Decompression failed or did not yield the requested length.
    Inflate(InflateError),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "source I/O error: {err}"),
            Self::OutOfRange {
                offset,
                len,
                source_len,
            } => write!(
                f,
                "read of {len} bytes at offset {offset} out of range (source length {source_len})"
            ),
            Self::Inflate(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Inflate(err) => Some(err),
            Self::OutOfRange { .. } => None,
        }
    }
}

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<InflateError> for SourceError {
    fn from(err: InflateError) -> Self {
        Self::Inflate(err)
    }
}

/// Random-access byte source with inflate-on-read.
///
/// All methods take `&self`; implementations must support concurrent
/// positioned reads or document that they do not. Short reads are errors,
/// never silently truncated results.
pub trait ByteSource {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// True if the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic name for error messages (typically the file path).
    fn name(&self) -> &str;

    /// Fills `out` from the bytes at `offset`.
    fn read_exact_at(&self, offset: u64, out: &mut [u8]) -> Result<(), SourceError>;

    /// Reads a big-endian u32 at `offset`.
    fn read_u32_be(&self, offset: u64) -> Result<u32, SourceError> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Decompresses the zlib stream starting at `offset` into exactly
    /// `out_len` bytes.
    fn read_inflated_at(&self, offset: u64, out_len: usize) -> Result<Vec<u8>, SourceError>;
}

/// Bounds-checks `offset..offset+len` and returns the subslice.
fn checked_slice(bytes: &[u8], offset: u64, len: usize) -> Result<&[u8], SourceError> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= bytes.len() as u64 => {
            Ok(&bytes[offset as usize..offset as usize + len])
        }
        _ => Err(SourceError::OutOfRange {
            offset,
            len,
            source_len: bytes.len() as u64,
        }),
    }
}

/// Inflates from `bytes[offset..]` into exactly `out_len` bytes.
fn inflate_from(bytes: &[u8], offset: u64, out_len: usize) -> Result<Vec<u8>, SourceError> {
    if offset > bytes.len() as u64 {
        return Err(SourceError::OutOfRange {
            offset,
            len: 0,
            source_len: bytes.len() as u64,
        });
    }
    let mut out = Vec::with_capacity(out_len);
    inflate_exact(&bytes[offset as usize..], &mut out, out_len)?;
    Ok(out)
}

/// Memory-mapped file source.
///
/// The mapping is private and read-only; the file must not be truncated
/// while mapped. Unmapping happens on `Drop`.
#[derive(Debug)]
pub struct MmapSource {
    map: Mmap,
    name: String,
}

impl MmapSource {
    /// Opens and maps a file.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        // SAFETY: pack and index files are immutable for the lifetime of
        // an open pack handle.
        let map = unsafe { Mmap::map(&file)? };
        advise_sequential(&file, &map);
        Ok(Self {
            map,
            name: path.display().to_string(),
        })
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_exact_at(&self, offset: u64, out: &mut [u8]) -> Result<(), SourceError> {
        let src = checked_slice(&self.map, offset, out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    fn read_inflated_at(&self, offset: u64, out_len: usize) -> Result<Vec<u8>, SourceError> {
        inflate_from(&self.map, offset, out_len)
    }
}

#[cfg(unix)]
fn advise_sequential(file: &File, map: &Mmap) {
    // SAFETY: the descriptor is open for the duration of the call and the
    // mapping pointer/length come from a live Mmap. Both calls are
    // advisory; failures are ignored.
    unsafe {
        #[cfg(target_os = "linux")]
        let _ = libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL);
        #[cfg(not(target_os = "linux"))]
        let _ = file;
        let _ = libc::madvise(
            map.as_ptr() as *mut libc::c_void,
            map.len(),
            libc::MADV_SEQUENTIAL,
        );
    }
}

#[cfg(not(unix))]
fn advise_sequential(_file: &File, _map: &Mmap) {}

/// Owned in-memory byte source.
#[derive(Debug, Clone)]
pub struct BytesSource {
    bytes: Vec<u8>,
    name: String,
}

impl BytesSource {
    /// Wraps a buffer with the default diagnostic name.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::with_name(bytes, "<bytes>")
    }

    /// Wraps a buffer with an explicit diagnostic name.
    #[must_use]
    pub fn with_name(bytes: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            name: name.into(),
        }
    }
}

impl ByteSource for BytesSource {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read_exact_at(&self, offset: u64, out: &mut [u8]) -> Result<(), SourceError> {
        let src = checked_slice(&self.bytes, offset, out.len())?;
        out.copy_from_slice(src);
        Ok(())
    }

    fn read_inflated_at(&self, offset: u64, out_len: usize) -> Result<Vec<u8>, SourceError> {
        inflate_from(&self.bytes, offset, out_len)
    }
}
