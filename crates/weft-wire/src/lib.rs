// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded byte cursors for the weft wire format.
//!
//! Two cursor types over caller-owned buffers:
//!
//! * [`WriteCursor`] — appends to a `Vec<u8>` up to an optional byte budget.
//! * [`ReadCursor`] — consumes a `&[u8]` front to back.
//!
//! Every `try_*` operation is **all-or-nothing**: it either transfers the
//! whole unit and reports success, or transfers nothing and reports "not
//! enough space/data". Short buffers are a status, never an error; the
//! caller re-invokes with a roomier cursor. The only hard errors at this
//! layer are malformed varints ([`WireError`]).
//!
//! Varints are little-endian 7-bit groups with the high bit as continuation:
//! at most 5 bytes for `u32`, 10 for `u64`.

mod read;
mod varint;
mod write;

pub use read::ReadCursor;
pub use varint::{varint32_len, varint64_len, MAX_VARINT32_LEN, MAX_VARINT64_LEN};
pub use write::WriteCursor;

/// Hard wire-level decode errors.
///
/// Everything else this crate signals ("not enough space/data") is a plain
/// status; these variants mean the byte stream itself is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A varint ran past its maximum encoded length without terminating.
    #[error("varint exceeds {max} bytes")]
    VarintTooLong {
        /// Maximum encoded length for the expected width.
        max: usize,
    },

    /// A varint terminated but its value does not fit the expected width.
    #[error("varint overflows {bits}-bit range")]
    VarintOverflow {
        /// Width of the expected integer in bits.
        bits: u32,
    },
}
