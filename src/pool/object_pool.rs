//! Double-buffered per-type object pool.

use super::ordinal_map::OrdinalMap;
use crate::error::{BlobError, Result};
use crate::types::{Hash, Ordinal};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Serialized object as held by a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PooledObject {
    pub bytes: Arc<[u8]>,
    pub fingerprint: Hash,
}

impl PooledObject {
    pub fn new(bytes: Arc<[u8]>) -> Self {
        let fingerprint = Hash::from_bytes(&bytes);
        Self { bytes, fingerprint }
    }
}

/// Loaded (reader-side) version of a pool: ordinal → bytes.
pub type LoadedObjects = BTreeMap<Ordinal, PooledObject>;

/// Effect of one `ObjectPool::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInsert {
    pub ordinal: Ordinal,
    /// The ordinal was not yet part of the current version.
    pub joined: bool,
    /// The content was new and took a fresh or released ordinal.
    pub assigned: bool,
}

/// Ordinal movement caused by one version advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Ordinals present in the new previous version but not the old one.
    pub added: usize,
    /// Ordinals dropped and released for reuse.
    pub removed: usize,
    /// Ordinals present in both versions.
    pub retained: usize,
}

/// Every serialized object of one type.
///
/// The write side keeps an `OrdinalMap` plus the ordinal membership of the
/// previous and current versions. Content stays in the map while either
/// version holds it, which is what keeps the ordinal of unchanged content
/// stable across versions. The loaded side is what the last decoded blob
/// described, and is only replaced wholesale.
#[derive(Debug)]
pub struct ObjectPool {
    type_name: String,
    ordinals: OrdinalMap,
    previous: BTreeSet<Ordinal>,
    current: BTreeSet<Ordinal>,
    sealed: bool,
    loaded: LoadedObjects,
}

impl ObjectPool {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ordinals: OrdinalMap::new(),
            previous: BTreeSet::new(),
            current: BTreeSet::new(),
            sealed: false,
            loaded: LoadedObjects::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Add serialized content to the current version.
    pub fn add(&mut self, bytes: &[u8]) -> Result<Ordinal> {
        self.insert(bytes).map(|i| i.ordinal)
    }

    /// Like `add`, but reports enough to `undo` the insert.
    pub fn insert(&mut self, bytes: &[u8]) -> Result<PoolInsert> {
        if self.sealed {
            return Err(BlobError::Lifecycle(format!(
                "pool {} is sealed for writing; advance the cycle before adding",
                self.type_name
            )));
        }
        let (ordinal, assigned) = self.ordinals.get_or_assign(bytes);
        let joined = self.current.insert(ordinal);
        Ok(PoolInsert {
            ordinal,
            joined,
            assigned,
        })
    }

    /// Revert an insert made in the current version.
    ///
    /// Inserts must be undone newest first.
    pub fn undo(&mut self, insert: PoolInsert) {
        if insert.joined {
            self.current.remove(&insert.ordinal);
        }
        if insert.assigned {
            self.ordinals.release(insert.ordinal);
        }
    }

    /// Stop accepting adds until the next cycle.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Make current the previous version and start an empty current one.
    pub fn prepare_for_next_cycle(&mut self) -> CycleStats {
        let removed: Vec<Ordinal> = self.removed_ordinals().collect();
        let stats = CycleStats {
            added: self.added_ordinals().count(),
            removed: removed.len(),
            retained: self.current.intersection(&self.previous).count(),
        };
        for ordinal in removed {
            self.ordinals.release(ordinal);
        }
        self.previous = std::mem::take(&mut self.current);
        self.sealed = false;
        stats
    }

    /// Ordinals in the current version, ascending.
    pub fn current_ordinals(&self) -> &BTreeSet<Ordinal> {
        &self.current
    }

    /// Ordinals in the previous version, ascending.
    pub fn previous_ordinals(&self) -> &BTreeSet<Ordinal> {
        &self.previous
    }

    /// Current minus previous, ascending.
    pub fn added_ordinals(&self) -> impl Iterator<Item = Ordinal> + '_ {
        self.current.difference(&self.previous).copied()
    }

    /// Previous minus current, ascending.
    pub fn removed_ordinals(&self) -> impl Iterator<Item = Ordinal> + '_ {
        self.previous.difference(&self.current).copied()
    }

    /// Content held at `ordinal` by either version.
    pub fn get(&self, ordinal: Ordinal) -> Option<&Arc<[u8]>> {
        self.ordinals.get(ordinal)
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    /// Current version as ordinal → bytes.
    pub fn current_objects(&self) -> LoadedObjects {
        self.current
            .iter()
            .filter_map(|o| {
                let bytes = self.ordinals.get(*o)?;
                let fingerprint = self.ordinals.fingerprint(*o)?;
                Some((
                    *o,
                    PooledObject {
                        bytes: Arc::clone(bytes),
                        fingerprint,
                    },
                ))
            })
            .collect()
    }

    pub fn loaded(&self) -> &LoadedObjects {
        &self.loaded
    }

    pub fn replace_loaded(&mut self, loaded: LoadedObjects) {
        self.loaded = loaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordinals(set: &BTreeSet<Ordinal>) -> Vec<u32> {
        set.iter().map(|o| o.0).collect()
    }

    #[test]
    fn test_add_dedups_within_version() {
        let mut pool = ObjectPool::new("T");
        let a = pool.add(b"x").unwrap();
        let b = pool.add(b"x").unwrap();
        let c = pool.add(b"y").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.current_len(), 2);
    }

    #[test]
    fn test_sealed_pool_rejects_adds() {
        let mut pool = ObjectPool::new("T");
        pool.add(b"x").unwrap();
        pool.seal();
        assert!(matches!(pool.add(b"y"), Err(BlobError::Lifecycle(_))));
        pool.prepare_for_next_cycle();
        assert!(pool.add(b"y").is_ok());
    }

    #[test]
    fn test_ordinals_stable_across_cycles() {
        let mut pool = ObjectPool::new("T");
        let a = pool.add(b"a").unwrap();
        let b = pool.add(b"b").unwrap();
        pool.prepare_for_next_cycle();

        assert_eq!(pool.add(b"b").unwrap(), b);
        assert_eq!(pool.add(b"a").unwrap(), a);
        assert_eq!(pool.added_ordinals().count(), 0);
        assert_eq!(pool.removed_ordinals().count(), 0);
    }

    #[test]
    fn test_added_and_removed() {
        let mut pool = ObjectPool::new("T");
        pool.add(b"a").unwrap();
        pool.add(b"b").unwrap();
        pool.prepare_for_next_cycle();

        pool.add(b"b").unwrap();
        pool.add(b"c").unwrap();
        assert_eq!(pool.added_ordinals().collect::<Vec<_>>(), vec![Ordinal(2)]);
        assert_eq!(pool.removed_ordinals().collect::<Vec<_>>(), vec![Ordinal(0)]);

        let stats = pool.prepare_for_next_cycle();
        assert_eq!(
            stats,
            CycleStats {
                added: 1,
                removed: 1,
                retained: 1
            }
        );
        assert_eq!(ordinals(pool.previous_ordinals()), vec![1, 2]);
        assert!(pool.current_ordinals().is_empty());
    }

    #[test]
    fn test_released_ordinal_reused_after_advance() {
        let mut pool = ObjectPool::new("T");
        pool.add(b"a").unwrap();
        pool.add(b"b").unwrap();
        pool.prepare_for_next_cycle();

        // "a" is dropped from the new version.
        pool.add(b"b").unwrap();
        pool.prepare_for_next_cycle();

        // Ordinal 0 was freed by the advance and is handed out first.
        pool.add(b"b").unwrap();
        assert_eq!(pool.add(b"z").unwrap(), Ordinal(0));
    }

    #[test]
    fn test_undo_restores_membership_and_ordinals() {
        let mut pool = ObjectPool::new("T");
        let kept = pool.add(b"kept").unwrap();
        pool.prepare_for_next_cycle();

        // Carried over from the previous version: undo leaves the content.
        let carried = pool.insert(b"kept").unwrap();
        assert_eq!((carried.ordinal, carried.joined, carried.assigned), (kept, true, false));
        let fresh = pool.insert(b"fresh").unwrap();
        assert!(fresh.joined && fresh.assigned);
        let again = pool.insert(b"fresh").unwrap();
        assert!(!again.joined && !again.assigned);

        pool.undo(again);
        pool.undo(fresh);
        pool.undo(carried);
        assert!(pool.current_ordinals().is_empty());
        assert!(pool.get(fresh.ordinal).is_none());
        assert_eq!(&**pool.get(kept).unwrap(), b"kept");
        assert_eq!(pool.add(b"other").unwrap(), fresh.ordinal);
    }

    #[test]
    fn test_previous_content_kept_until_advance() {
        let mut pool = ObjectPool::new("T");
        let a = pool.add(b"a").unwrap();
        pool.prepare_for_next_cycle();
        pool.add(b"b").unwrap();

        // Still readable for reverse deltas while in the previous version.
        assert_eq!(&**pool.get(a).unwrap(), b"a");
        pool.prepare_for_next_cycle();
        assert!(pool.get(a).is_none());
    }

    #[test]
    fn test_current_objects() {
        let mut pool = ObjectPool::new("T");
        pool.add(b"a").unwrap();
        pool.add(b"b").unwrap();
        let objects = pool.current_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(&*objects[&Ordinal(1)].bytes, b"b");
        assert_eq!(objects[&Ordinal(1)].fingerprint, Hash::from_bytes(b"b"));
    }
}
