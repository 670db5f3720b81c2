//! Blob header and checksum footer.

use super::wire::{WireReader, WireWriter};
use crate::error::{BlobError, Result};
use crate::types::BlobKind;
use std::collections::BTreeMap;

/// Magic bytes for blobs.
pub const BLOB_MAGIC: &[u8; 4] = b"FBLB";

/// Current blob format version.
pub const BLOB_VERSION: u8 = 1;

/// CRC-32 of everything before it, little-endian.
pub const FOOTER_LEN: usize = 4;

/// Leading metadata of a snapshot or delta blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobHeader {
    pub kind: BlobKind,
    /// Opaque version identifier supplied by the producer.
    pub version: Option<String>,
    pub tags: BTreeMap<String, String>,
    /// Number of type sections that follow.
    pub type_count: usize,
}

impl BlobHeader {
    pub(crate) fn write(&self, w: &mut WireWriter) {
        w.write_raw(BLOB_MAGIC);
        w.write_u8(BLOB_VERSION);
        w.write_u8(self.kind.to_byte());
        w.write_nullable_str(self.version.as_deref());
        w.write_varint(self.tags.len() as u64);
        for (key, value) in &self.tags {
            w.write_str(key);
            w.write_str(value);
        }
        w.write_varint(self.type_count as u64);
    }

    pub(crate) fn read(r: &mut WireReader<'_>) -> Result<Self> {
        let magic = r.take(BLOB_MAGIC.len())?;
        if magic != BLOB_MAGIC {
            return Err(BlobError::InvalidFormat("Invalid blob magic".into()));
        }

        let version_byte = r.read_u8()?;
        if version_byte != BLOB_VERSION {
            return Err(BlobError::InvalidFormat(format!(
                "Unsupported blob version: {}",
                version_byte
            )));
        }

        let kind_byte = r.read_u8()?;
        let kind = BlobKind::from_byte(kind_byte).ok_or_else(|| {
            BlobError::InvalidFormat(format!("Unknown blob kind: {}", kind_byte))
        })?;

        let version = r.read_nullable_str()?.map(str::to_string);

        // Key and value take at least one length byte each.
        let tag_count = r.read_count(2)?;
        let mut tags = BTreeMap::new();
        for _ in 0..tag_count {
            let key = r.read_str()?.to_string();
            let value = r.read_str()?.to_string();
            tags.insert(key, value);
        }

        // Type name length plus four fingerprint bytes.
        let type_count = r.read_count(5)?;

        Ok(Self {
            kind,
            version,
            tags,
            type_count,
        })
    }
}

/// Append the CRC-32 footer over everything written so far.
pub(crate) fn append_footer(w: &mut WireWriter) {
    let checksum = crc32fast::hash(w.as_slice());
    w.write_u32_le(checksum);
}

/// Strip the footer, verifying it when asked.
pub(crate) fn split_footer(data: &[u8], verify: bool) -> Result<&[u8]> {
    if data.len() < FOOTER_LEN {
        return Err(BlobError::Truncated {
            offset: 0,
            needed: FOOTER_LEN,
            remaining: data.len(),
        });
    }
    let (body, footer) = data.split_at(data.len() - FOOTER_LEN);
    if verify {
        let stored = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(BlobError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }
    }
    Ok(body)
}
