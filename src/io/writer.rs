//! Blob encoding.

use super::header::{append_footer, BlobHeader};
use super::wire::WireWriter;
use crate::error::{BlobError, Result};
use crate::pool::ObjectPool;
use crate::state::StateEngine;
use crate::types::{BlobKind, Ordinal};
use std::io::Write;
use tracing::info;

/// Encodes a sealed engine's pools as a snapshot, delta, or reverse delta.
pub struct BlobWriter<'a> {
    engine: &'a StateEngine,
}

impl<'a> BlobWriter<'a> {
    pub fn new(engine: &'a StateEngine) -> Self {
        Self { engine }
    }

    /// Write every object of the current version. Returns bytes written.
    pub fn write_snapshot<W: Write>(&self, out: &mut W) -> Result<usize> {
        self.write(BlobKind::Snapshot, out)
    }

    /// Write the changes from the previous version to the current one.
    pub fn write_delta<W: Write>(&self, out: &mut W) -> Result<usize> {
        self.write(BlobKind::Delta, out)
    }

    /// Write the changes from the current version back to the previous one.
    pub fn write_reverse_delta<W: Write>(&self, out: &mut W) -> Result<usize> {
        self.write(BlobKind::ReverseDelta, out)
    }

    fn write<W: Write>(&self, kind: BlobKind, out: &mut W) -> Result<usize> {
        let bytes = self.encode(kind)?;
        out.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Encode a blob of the given kind into memory.
    pub fn encode(&self, kind: BlobKind) -> Result<Vec<u8>> {
        if !self.engine.is_sealed() {
            return Err(BlobError::Lifecycle(
                "call prepare_for_write before encoding".into(),
            ));
        }

        let registry = self.engine.registry();
        let header = BlobHeader {
            kind,
            version: self.engine.latest_version(),
            tags: self.engine.header_tags(),
            type_count: self.engine.pool_count(),
        };

        let mut w = WireWriter::with_capacity(4096);
        header.write(&mut w);

        for index in 0..self.engine.pool_count() {
            let schema = registry.codec(index).schema();
            let pool = self.engine.read_pool(index);

            w.write_str(pool.type_name());
            w.write_u32_le(schema.fingerprint());

            match kind {
                BlobKind::Snapshot => {
                    let ordinals: Vec<Ordinal> = pool.current_ordinals().iter().copied().collect();
                    write_objects(&mut w, &pool, &ordinals)?;
                }
                BlobKind::Delta => {
                    let removed: Vec<Ordinal> = pool.removed_ordinals().collect();
                    let added: Vec<Ordinal> = pool.added_ordinals().collect();
                    write_ordinals(&mut w, &removed);
                    write_objects(&mut w, &pool, &added)?;
                }
                BlobKind::ReverseDelta => {
                    let removed: Vec<Ordinal> = pool.added_ordinals().collect();
                    let added: Vec<Ordinal> = pool.removed_ordinals().collect();
                    write_ordinals(&mut w, &removed);
                    write_objects(&mut w, &pool, &added)?;
                }
            }
        }

        append_footer(&mut w);
        info!(
            ?kind,
            version = ?header.version,
            types = header.type_count,
            bytes = w.len(),
            "encoded blob"
        );
        Ok(w.into_inner())
    }
}

fn write_ordinals(w: &mut WireWriter, ordinals: &[Ordinal]) {
    w.write_varint(ordinals.len() as u64);
    for ordinal in ordinals {
        w.write_ordinal(*ordinal);
    }
}

/// Count, then each ordinal followed by its field bytes.
fn write_objects(w: &mut WireWriter, pool: &ObjectPool, ordinals: &[Ordinal]) -> Result<()> {
    w.write_varint(ordinals.len() as u64);
    for ordinal in ordinals {
        let bytes = pool.get(*ordinal).ok_or_else(|| BlobError::InvalidOrdinal {
            type_name: pool.type_name().to_string(),
            ordinal: *ordinal,
            reason: "no content held for a live ordinal",
        })?;
        w.write_ordinal(*ordinal);
        w.write_raw(bytes);
    }
    Ok(())
}
