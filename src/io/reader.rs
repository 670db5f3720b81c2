//! Blob decoding.

use super::header::{split_footer, BlobHeader};
use super::wire::WireReader;
use crate::error::{BlobError, Result};
use crate::pool::{LoadedObjects, PooledObject};
use crate::schema::{Record, Schema};
use crate::state::StateEngine;
use crate::types::{BlobKind, Ordinal};
use std::io::Read;
use std::sync::Arc;
use tracing::info;

/// Decodes snapshot and delta blobs into an engine's loaded state.
///
/// Every section is decoded and validated into staging maps first; the
/// engine is only touched once the whole blob has been accepted.
pub struct BlobReader<'a> {
    engine: &'a StateEngine,
}

impl<'a> BlobReader<'a> {
    pub fn new(engine: &'a StateEngine) -> Self {
        Self { engine }
    }

    /// Replace the loaded state with a snapshot.
    pub fn read_snapshot<R: Read>(&self, input: &mut R) -> Result<BlobHeader> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        self.decode_snapshot(&data)
    }

    /// Apply a delta or reverse delta to the loaded state.
    pub fn read_delta<R: Read>(&self, input: &mut R) -> Result<BlobHeader> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        self.decode_delta(&data)
    }

    pub fn decode_snapshot(&self, data: &[u8]) -> Result<BlobHeader> {
        self.decode(data, false)
    }

    pub fn decode_delta(&self, data: &[u8]) -> Result<BlobHeader> {
        self.decode(data, true)
    }

    fn decode(&self, data: &[u8], delta: bool) -> Result<BlobHeader> {
        let body = split_footer(data, self.engine.config().verify_checksums)?;
        let mut r = WireReader::new(body);
        let header = BlobHeader::read(&mut r)?;

        if header.kind.is_delta() != delta {
            return Err(BlobError::InvalidFormat(format!(
                "expected a {} blob, found a {}",
                if delta { "delta" } else { "snapshot" },
                kind_name(header.kind)
            )));
        }
        if header.type_count != self.engine.pool_count() {
            return Err(BlobError::InvalidFormat(format!(
                "blob has {} type sections, engine registers {}",
                header.type_count,
                self.engine.pool_count()
            )));
        }

        let mut base = if delta {
            self.engine.loaded_state()
        } else {
            Vec::new()
        };
        let registry = self.engine.registry();
        let mut staged: Vec<LoadedObjects> = Vec::with_capacity(header.type_count);

        for index in 0..header.type_count {
            let codec = registry.codec(index);
            let schema = codec.schema();

            let name = r.read_str()?;
            if name != codec.type_name() {
                return Err(BlobError::InvalidFormat(format!(
                    "type section {} is {}, expected {}",
                    index,
                    name,
                    codec.type_name()
                )));
            }
            let found = r.read_u32_le()?;
            let expected = schema.fingerprint();
            if found != expected {
                return Err(BlobError::SchemaFingerprint {
                    type_name: name.to_string(),
                    expected,
                    found,
                });
            }

            let loaded = if delta {
                let mut loaded = std::mem::take(&mut base[index]);
                for ordinal in read_ordinals(&mut r, name)? {
                    if loaded.remove(&ordinal).is_none() {
                        return Err(BlobError::InvalidOrdinal {
                            type_name: name.to_string(),
                            ordinal,
                            reason: "removed by delta but not loaded",
                        });
                    }
                }
                for (ordinal, object) in self.read_objects(&mut r, schema, &staged)? {
                    if loaded.insert(ordinal, object).is_some() {
                        return Err(BlobError::InvalidOrdinal {
                            type_name: name.to_string(),
                            ordinal,
                            reason: "added by delta but already loaded",
                        });
                    }
                }
                loaded
            } else {
                self.read_objects(&mut r, schema, &staged)?
                    .into_iter()
                    .collect()
            };
            staged.push(loaded);
        }

        if !r.is_empty() {
            return Err(BlobError::InvalidFormat(format!(
                "{} trailing bytes after last type section",
                r.remaining()
            )));
        }

        let object_count: usize = staged.iter().map(|s| s.len()).sum();
        self.engine.install_loaded(staged, header.version.clone());
        info!(
            kind = ?header.kind,
            version = ?header.version,
            objects = object_count,
            bytes = data.len(),
            "decoded blob"
        );
        Ok(header)
    }

    /// Read a counted list of (ordinal, fields), ordinal-ascending.
    ///
    /// References are checked against the already staged state of the
    /// referenced types, which registry order guarantees precede this one.
    fn read_objects(
        &self,
        r: &mut WireReader<'_>,
        schema: &Schema,
        staged: &[LoadedObjects],
    ) -> Result<Vec<(Ordinal, PooledObject)>> {
        let count = r.read_count(1 + schema.len())?;
        let mut objects = Vec::with_capacity(count);
        let mut last: Option<Ordinal> = None;

        for _ in 0..count {
            let ordinal = r.read_ordinal()?;
            check_ascending(schema.name(), last, ordinal)?;
            last = Some(ordinal);

            let start = r.position();
            let record = Record::decode(schema, r, None)?;
            for (ref_type, ref_ordinal) in record.references() {
                let present = self
                    .engine
                    .registry()
                    .index_of(ref_type)
                    .and_then(|i| staged.get(i))
                    .is_some_and(|s| s.contains_key(&ref_ordinal));
                if !present {
                    return Err(BlobError::InvalidOrdinal {
                        type_name: ref_type.to_string(),
                        ordinal: ref_ordinal,
                        reason: "referenced by another type but not present",
                    });
                }
            }

            let bytes: Arc<[u8]> = Arc::from(r.consumed_since(start));
            objects.push((ordinal, PooledObject::new(bytes)));
        }
        Ok(objects)
    }
}

fn read_ordinals(r: &mut WireReader<'_>, type_name: &str) -> Result<Vec<Ordinal>> {
    let count = r.read_count(1)?;
    let mut ordinals = Vec::with_capacity(count);
    let mut last = None;
    for _ in 0..count {
        let ordinal = r.read_ordinal()?;
        check_ascending(type_name, last, ordinal)?;
        last = Some(ordinal);
        ordinals.push(ordinal);
    }
    Ok(ordinals)
}

fn check_ascending(type_name: &str, last: Option<Ordinal>, ordinal: Ordinal) -> Result<()> {
    match last {
        Some(prev) if ordinal <= prev => Err(BlobError::InvalidOrdinal {
            type_name: type_name.to_string(),
            ordinal,
            reason: "ordinals out of ascending order",
        }),
        _ => Ok(()),
    }
}

fn kind_name(kind: BlobKind) -> &'static str {
    match kind {
        BlobKind::Snapshot => "snapshot",
        BlobKind::Delta => "delta",
        BlobKind::ReverseDelta => "reverse delta",
    }
}
