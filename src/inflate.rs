//! Bounded zlib inflation over in-memory pack bytes.
//!
//! Thin wrappers around `flate2::Decompress` with hard output caps. Per
//! thread, one decompressor and one bounce buffer are reused across calls
//! to avoid allocation churn on hot read paths.
//!
//! # Caller Expectations
//! - `input` starts at the first byte of a zlib stream; trailing bytes
//!   after the stream end are ignored.
//! - Callers reserve output capacity up front; the helpers clear the
//!   output buffer before writing.
//! - On error the output may hold a partial prefix; discard it.

use std::cell::RefCell;
use std::fmt;

use flate2::{Decompress, FlushDecompress, Status};

/// Bounce buffer size for inflation.
const INFLATE_BUF_SIZE: usize = 64 * 1024;

thread_local! {
    static SCRATCH_DECOMPRESS: RefCell<Decompress> = RefCell::new(Decompress::new(true));
    static SCRATCH_BUF: RefCell<[u8; INFLATE_BUF_SIZE]> =
        const { RefCell::new([0u8; INFLATE_BUF_SIZE]) };
}

/// Runs an inflate operation with the per-thread scratch state.
///
/// Not re-entrant on the same thread; the helpers here never call back
/// into each other while holding the scratch borrow.
fn with_inflate_scratch<F, R>(f: F) -> R
where
    F: FnOnce(&mut Decompress, &mut [u8]) -> R,
{
    SCRATCH_DECOMPRESS.with(|de| {
        SCRATCH_BUF.with(|buf| {
            let mut de = de.borrow_mut();
            de.reset(true);
            let mut buf = buf.borrow_mut();
            f(&mut de, &mut *buf)
        })
    })
}

/// Inflate error taxonomy.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InflateError {
    /// Output would exceed the configured cap.
    LimitExceeded,
    /// The stream ended early or produced fewer bytes than required.
    TruncatedInput,
    /// The decompressor made no progress with input remaining.
    Stalled,
    /// The zlib backend reported a data error.
    Backend,
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitExceeded => write!(f, "inflate limit exceeded"),
            Self::TruncatedInput => write!(f, "truncated inflate input"),
            Self::Stalled => write!(f, "inflate stalled"),
            Self::Backend => write!(f, "inflate backend error"),
        }
    }
}

impl std::error::Error for InflateError {}

/// Inflate a zlib stream with a hard output cap.
///
/// Returns the number of input bytes consumed. The stream may end before
/// `input` does; the remainder is untouched.
pub fn inflate_limited(
    input: &[u8],
    out: &mut Vec<u8>,
    max_out: usize,
) -> Result<usize, InflateError> {
    out.clear();

    with_inflate_scratch(|de, buf| {
        let mut in_pos: usize = 0;

        loop {
            let before_in = de.total_in() as usize;
            let before_out = de.total_out() as usize;

            let status = de
                .decompress(&input[in_pos..], buf, FlushDecompress::None)
                .map_err(|_| InflateError::Backend)?;

            let consumed = de.total_in() as usize - before_in;
            let produced = de.total_out() as usize - before_out;
            in_pos += consumed;

            if produced != 0 {
                if out.len() + produced > max_out {
                    return Err(InflateError::LimitExceeded);
                }
                out.extend_from_slice(&buf[..produced]);
            }

            match status {
                Status::StreamEnd => return Ok(in_pos),
                Status::Ok => {
                    if consumed == 0 && produced == 0 {
                        if in_pos >= input.len() {
                            return Err(InflateError::TruncatedInput);
                        }
                        return Err(InflateError::Stalled);
                    }
                }
                Status::BufError => {
                    if in_pos >= input.len() {
                        return Err(InflateError::TruncatedInput);
                    }
                }
            }
        }
    })
}

/// Inflate a zlib stream expecting exactly `expected` output bytes.
///
/// Returns the number of input bytes consumed. A stream producing more
/// than `expected` bytes fails with `LimitExceeded`, fewer with
/// `TruncatedInput`.
pub fn inflate_exact(
    input: &[u8],
    out: &mut Vec<u8>,
    expected: usize,
) -> Result<usize, InflateError> {
    let consumed = inflate_limited(input, out, expected)?;
    if out.len() != expected {
        return Err(InflateError::TruncatedInput);
    }
    Ok(consumed)
}
