//! Content-addressed ordinal arena.

use crate::types::{Hash, Ordinal};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Slot {
    bytes: Arc<[u8]>,
    fingerprint: Hash,
}

/// Arena of serialized objects indexed by ordinal, with a fingerprint index
/// for deduplication.
///
/// Fingerprint hits are confirmed by comparing bytes, so two different
/// contents sharing a fingerprint get distinct ordinals.
#[derive(Debug, Default)]
pub struct OrdinalMap {
    slots: Vec<Option<Slot>>,
    index: HashMap<Hash, Vec<Ordinal>>,
    free: BTreeSet<Ordinal>,
    live: usize,
}

impl OrdinalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal holding exactly `bytes`, if any.
    pub fn find(&self, fingerprint: &Hash, bytes: &[u8]) -> Option<Ordinal> {
        self.index
            .get(fingerprint)?
            .iter()
            .copied()
            .find(|o| self.get(*o).is_some_and(|held| &**held == bytes))
    }

    /// Return the ordinal for `bytes`, assigning one if the content is new.
    ///
    /// New content takes the lowest released ordinal before growing the arena.
    /// The flag is true when an ordinal was assigned.
    pub fn get_or_assign(&mut self, bytes: &[u8]) -> (Ordinal, bool) {
        let fingerprint = Hash::from_bytes(bytes);
        if let Some(ordinal) = self.find(&fingerprint, bytes) {
            return (ordinal, false);
        }

        let ordinal = match self.free.pop_first() {
            Some(ordinal) => ordinal,
            None => {
                self.slots.push(None);
                Ordinal((self.slots.len() - 1) as u32)
            }
        };
        self.slots[ordinal.index()] = Some(Slot {
            bytes: Arc::from(bytes),
            fingerprint,
        });
        self.index.entry(fingerprint).or_default().push(ordinal);
        self.live += 1;
        (ordinal, true)
    }

    pub fn get(&self, ordinal: Ordinal) -> Option<&Arc<[u8]>> {
        self.slots
            .get(ordinal.index())
            .and_then(|s| s.as_ref())
            .map(|s| &s.bytes)
    }

    pub fn fingerprint(&self, ordinal: Ordinal) -> Option<Hash> {
        self.slots
            .get(ordinal.index())
            .and_then(|s| s.as_ref())
            .map(|s| s.fingerprint)
    }

    /// Drop the content at `ordinal` and make the ordinal reusable.
    pub fn release(&mut self, ordinal: Ordinal) -> bool {
        let Some(slot) = self.slots.get_mut(ordinal.index()).and_then(Option::take) else {
            return false;
        };
        if let Some(chain) = self.index.get_mut(&slot.fingerprint) {
            chain.retain(|o| *o != ordinal);
            if chain.is_empty() {
                self.index.remove(&slot.fingerprint);
            }
        }
        self.free.insert(ordinal);
        self.live -= 1;
        true
    }

    /// Number of ordinals currently holding content.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplication() {
        let mut map = OrdinalMap::new();
        let (a, new_a) = map.get_or_assign(b"same");
        let (b, new_b) = map.get_or_assign(b"same");
        assert_eq!(a, b);
        assert!(new_a);
        assert!(!new_b);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_sequential_assignment() {
        let mut map = OrdinalMap::new();
        assert_eq!(map.get_or_assign(b"a").0, Ordinal(0));
        assert_eq!(map.get_or_assign(b"b").0, Ordinal(1));
        assert_eq!(map.get_or_assign(b"c").0, Ordinal(2));
        assert_eq!(&**map.get(Ordinal(1)).unwrap(), b"b");
    }

    #[test]
    fn test_release_and_reuse_lowest() {
        let mut map = OrdinalMap::new();
        for content in [b"a", b"b", b"c", b"d"] {
            map.get_or_assign(content);
        }
        assert!(map.release(Ordinal(2)));
        assert!(map.release(Ordinal(1)));
        assert!(!map.release(Ordinal(1)));
        assert!(map.get(Ordinal(1)).is_none());

        assert_eq!(map.get_or_assign(b"e").0, Ordinal(1));
        assert_eq!(map.get_or_assign(b"f").0, Ordinal(2));
        assert_eq!(map.get_or_assign(b"g").0, Ordinal(4));
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_released_content_is_forgotten() {
        let mut map = OrdinalMap::new();
        let (a, _) = map.get_or_assign(b"gone");
        map.release(a);
        assert!(map.find(&Hash::from_bytes(b"gone"), b"gone").is_none());
    }

    #[test]
    fn test_fingerprint_collision_falls_back_to_bytes() {
        let mut map = OrdinalMap::new();
        let (a, _) = map.get_or_assign(b"first");

        // Forge a collision: file "second" under the fingerprint of "first".
        let forged = Hash::from_bytes(b"first");
        map.slots.push(Some(Slot {
            bytes: Arc::from(&b"second"[..]),
            fingerprint: forged,
        }));
        let b = Ordinal(1);
        map.index.get_mut(&forged).unwrap().push(b);
        map.live += 1;

        assert_eq!(map.find(&forged, b"first"), Some(a));
        assert_eq!(map.find(&forged, b"second"), Some(b));
        assert_eq!(map.find(&forged, b"third"), None);
    }
}
