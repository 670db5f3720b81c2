//! Variable-width wire primitives.
//!
//! Integers are LEB128 varints; signed values are zigzag-mapped first.
//! Nullable fields use the two-byte sequence `0x80 0x00` as a null marker:
//! it decodes as a non-canonical zero, which no encoder ever emits, so the
//! reader rejects it everywhere a null is not expected.

use crate::error::{BlobError, Result};
use crate::types::Ordinal;

/// Null marker for nullable fields.
pub const NULL_MARKER: [u8; 2] = [0x80, 0x00];

/// Longest LEB128 encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append-only byte sink with varint helpers.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    pub fn write_signed(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    pub fn write_ordinal(&mut self, ordinal: Ordinal) {
        self.write_varint(u64::from(ordinal.0));
    }

    pub fn write_null(&mut self) {
        self.buf.extend_from_slice(&NULL_MARKER);
    }

    /// Varint length followed by the bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_nullable_str(&mut self, value: Option<&str>) {
        match value {
            Some(s) => self.write_str(s),
            None => self.write_null(),
        }
    }
}

/// Bounds-checked cursor over an encoded blob.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes between two positions already consumed by this reader.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(BlobError::Truncated {
                offset: self.pos,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            if i == MAX_VARINT_LEN - 1 && byte > 0x01 {
                return Err(BlobError::InvalidFormat(format!(
                    "varint overflows u64 at offset {}",
                    start
                )));
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                if byte == 0 && i > 0 {
                    return Err(BlobError::InvalidFormat(format!(
                        "non-canonical varint at offset {}",
                        start
                    )));
                }
                return Ok(value);
            }
        }
        Err(BlobError::InvalidFormat(format!(
            "varint longer than {} bytes at offset {}",
            MAX_VARINT_LEN, start
        )))
    }

    pub fn read_signed(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    pub fn read_ordinal(&mut self) -> Result<Ordinal> {
        let offset = self.pos;
        let raw = self.read_varint()?;
        u32::try_from(raw).map(Ordinal).map_err(|_| {
            BlobError::InvalidFormat(format!("ordinal {} out of range at offset {}", raw, offset))
        })
    }

    /// Read a varint count and check it against the bytes left.
    ///
    /// Every counted item takes at least `min_item_len` bytes, so a count
    /// larger than that allows is a corrupt length prefix.
    pub fn read_count(&mut self, min_item_len: usize) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_varint()?;
        let limit = (self.remaining() / min_item_len.max(1)) as u64;
        if count > limit {
            return Err(BlobError::InvalidFormat(format!(
                "count {} at offset {} exceeds remaining {} bytes",
                count,
                offset,
                self.remaining()
            )));
        }
        Ok(count as usize)
    }

    /// Consume the null marker if it is next.
    pub fn read_null(&mut self) -> bool {
        if self.data[self.pos..].starts_with(&NULL_MARKER) {
            self.pos += NULL_MARKER.len();
            true
        } else {
            false
        }
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let offset = self.pos;
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or_else(|| {
                BlobError::InvalidFormat(format!(
                    "length prefix {} at offset {} exceeds remaining {} bytes",
                    len,
                    offset,
                    self.remaining()
                ))
            })?;
        self.take(len)
    }

    pub fn read_str(&mut self) -> Result<&'a str> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes).map_err(|e| {
            BlobError::InvalidFormat(format!("invalid UTF-8 at offset {}: {}", offset, e))
        })
    }

    pub fn read_nullable_str(&mut self) -> Result<Option<&'a str>> {
        if self.read_null() {
            return Ok(None);
        }
        self.read_str().map(Some)
    }
}
