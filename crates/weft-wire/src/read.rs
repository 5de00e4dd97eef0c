// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Front-to-back read cursor.

use crate::varint::{MAX_VARINT32_LEN, MAX_VARINT64_LEN};
use crate::WireError;

/// Consuming cursor over a caller-owned byte slice.
///
/// The mirror of [`crate::WriteCursor`]: `try_*` units either read whole and
/// advance, or read nothing and return `None` ("not enough data — retry with
/// more"). The caller is responsible for re-presenting unconsumed bytes on
/// the next call; [`ReadCursor::consumed`] reports how far this cursor got.
#[derive(Debug)]
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    /// Creates a cursor over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Reads a fixed-size array if that many bytes remain.
    #[inline]
    fn try_read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.buf.get(self.pos..self.pos + N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos += N;
        Some(out)
    }

    /// Reads one byte.
    #[inline]
    pub fn try_read_u8(&mut self) -> Option<u8> {
        self.try_read_array::<1>().map(|[b]| b)
    }

    /// Reads one signed byte.
    #[inline]
    pub fn try_read_i8(&mut self) -> Option<i8> {
        self.try_read_array().map(i8::from_le_bytes)
    }

    /// Reads a `u16` little-endian.
    #[inline]
    pub fn try_read_u16(&mut self) -> Option<u16> {
        self.try_read_array().map(u16::from_le_bytes)
    }

    /// Reads an `i16` little-endian.
    #[inline]
    pub fn try_read_i16(&mut self) -> Option<i16> {
        self.try_read_array().map(i16::from_le_bytes)
    }

    /// Reads a `u32` little-endian.
    #[inline]
    pub fn try_read_u32(&mut self) -> Option<u32> {
        self.try_read_array().map(u32::from_le_bytes)
    }

    /// Reads an `i32` little-endian.
    #[inline]
    pub fn try_read_i32(&mut self) -> Option<i32> {
        self.try_read_array().map(i32::from_le_bytes)
    }

    /// Reads a `u64` little-endian.
    #[inline]
    pub fn try_read_u64(&mut self) -> Option<u64> {
        self.try_read_array().map(u64::from_le_bytes)
    }

    /// Reads an `i64` little-endian.
    #[inline]
    pub fn try_read_i64(&mut self) -> Option<i64> {
        self.try_read_array().map(i64::from_le_bytes)
    }

    /// Reads an `f32` little-endian.
    #[inline]
    pub fn try_read_f32(&mut self) -> Option<f32> {
        self.try_read_array().map(f32::from_le_bytes)
    }

    /// Reads an `f64` little-endian.
    #[inline]
    pub fn try_read_f64(&mut self) -> Option<f64> {
        self.try_read_array().map(f64::from_le_bytes)
    }

    /// Borrows the next `len` bytes whole, or reads nothing.
    pub fn try_read_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.buf.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(bytes)
    }

    /// Copies up to `dst.len()` bytes out, returning how many were
    /// transferred. Partial by design; pairs with
    /// [`crate::WriteCursor::write_raw`].
    pub fn read_raw(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Borrows up to `max` of the remaining bytes and consumes them.
    /// Partial by design.
    pub fn read_raw_slice(&mut self, max: usize) -> &'a [u8] {
        let n = max.min(self.remaining());
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        bytes
    }

    /// Reads a `u32` varint whole.
    ///
    /// `Ok(None)` means the encoding runs past the available bytes — retry
    /// with more data, nothing consumed. A non-terminating or overflowing
    /// encoding is a hard [`WireError`].
    pub fn try_read_varint32(&mut self) -> Result<Option<u32>, WireError> {
        match self.try_read_varint(MAX_VARINT32_LEN)? {
            None => Ok(None),
            Some(v) => u32::try_from(v)
                .map(Some)
                .map_err(|_| WireError::VarintOverflow { bits: 32 }),
        }
    }

    /// Reads a `u64` varint whole. Same contract as
    /// [`ReadCursor::try_read_varint32`].
    pub fn try_read_varint64(&mut self) -> Result<Option<u64>, WireError> {
        self.try_read_varint(MAX_VARINT64_LEN)
    }

    fn try_read_varint(&mut self, max_len: usize) -> Result<Option<u64>, WireError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        for (i, &byte) in self.buf[self.pos..].iter().enumerate() {
            if i == max_len {
                return Err(WireError::VarintTooLong { max: max_len });
            }
            if i == max_len - 1 {
                // The last permitted byte: no continuation, no stray bits.
                if byte & 0x80 != 0 {
                    return Err(WireError::VarintTooLong { max: max_len });
                }
                if u64::from(byte) << shift >> shift != u64::from(byte) {
                    return Err(WireError::VarintOverflow { bits: 64 });
                }
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(Some(value));
            }
            shift += 7;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteCursor;

    #[test]
    fn fixed_units_are_all_or_nothing() {
        let mut cur = ReadCursor::new(&[1, 2, 3]);
        assert!(cur.try_read_u32().is_none());
        assert_eq!(cur.consumed(), 0, "failed unit must consume nothing");
        assert_eq!(cur.try_read_u16(), Some(0x0201));
        assert_eq!(cur.try_read_u8(), Some(3));
        assert!(cur.try_read_u8().is_none());
    }

    #[test]
    fn varint_roundtrip() {
        let mut buf = Vec::new();
        let mut w = WriteCursor::new(&mut buf);
        for v in [0u64, 1, 0x7f, 0x80, 0x3fff, 0x4000, u64::from(u32::MAX), u64::MAX] {
            assert!(w.try_write_varint64(v));
        }
        let mut r = ReadCursor::new(&buf);
        for v in [0u64, 1, 0x7f, 0x80, 0x3fff, 0x4000, u64::from(u32::MAX), u64::MAX] {
            assert_eq!(r.try_read_varint64().unwrap(), Some(v));
        }
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn varint_golden_vectors() {
        let mut buf = Vec::new();
        let mut w = WriteCursor::new(&mut buf);
        assert!(w.try_write_varint32(300));
        assert!(w.try_write_varint32(1));
        assert_eq!(buf, hex::decode("ac0201").unwrap());
    }

    #[test]
    fn truncated_varint_stalls_without_consuming() {
        // 0x80 alone promises a continuation that never arrives.
        let mut cur = ReadCursor::new(&[0x80]);
        assert_eq!(cur.try_read_varint64().unwrap(), None);
        assert_eq!(cur.consumed(), 0);
    }

    #[test]
    fn overlong_varint_is_fatal() {
        let mut cur = ReadCursor::new(&[0x80; 11]);
        assert_eq!(
            cur.try_read_varint64(),
            Err(WireError::VarintTooLong { max: 10 })
        );
    }

    #[test]
    fn varint32_overflow_is_fatal() {
        let mut buf = Vec::new();
        assert!(WriteCursor::new(&mut buf).try_write_varint64(u64::from(u32::MAX) + 1));
        let mut cur = ReadCursor::new(&buf);
        assert_eq!(
            cur.try_read_varint32(),
            Err(WireError::VarintOverflow { bits: 32 })
        );
    }

    #[test]
    fn raw_reads_are_partial() {
        let mut cur = ReadCursor::new(b"abc");
        let mut dst = [0u8; 2];
        assert_eq!(cur.read_raw(&mut dst), 2);
        assert_eq!(&dst, b"ab");
        assert_eq!(cur.read_raw_slice(5), b"c");
        assert_eq!(cur.read_raw(&mut dst), 0);
    }
}
