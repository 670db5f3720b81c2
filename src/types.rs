//! Core types shared across the engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Per-type, per-version identity of a deduplicated serialized object.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Ordinal(pub u32);

impl Ordinal {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ordinal({})", self.0)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content fingerprint of serialized object bytes (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Kind of encoded blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobKind {
    /// Every live ordinal of every type.
    Snapshot,

    /// Ordinals added and removed going from the previous version to the current one.
    Delta,

    /// Ordinals added and removed going from the current version back to the previous one.
    ReverseDelta,
}

impl BlobKind {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            BlobKind::Snapshot => 0,
            BlobKind::Delta => 1,
            BlobKind::ReverseDelta => 2,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(BlobKind::Snapshot),
            1 => Some(BlobKind::Delta),
            2 => Some(BlobKind::ReverseDelta),
            _ => None,
        }
    }

    pub fn is_delta(self) -> bool {
        !matches!(self, BlobKind::Snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_display() {
        let hash = Hash::from_bytes(b"hello world");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(hash.to_string(), hex);
        assert!(format!("{:?}", hash).starts_with(&format!("Hash({}", &hex[..8])));
    }

    #[test]
    fn test_hash_distinguishes_content() {
        assert_ne!(Hash::from_bytes(b"a"), Hash::from_bytes(b"b"));
        assert_eq!(Hash::from_bytes(b"a"), Hash::from_bytes(b"a"));
    }

    #[test]
    fn test_ordinal_navigation() {
        assert_eq!(Ordinal(3).index(), 3);
        assert!(Ordinal(1) < Ordinal(2));
    }

    #[test]
    fn test_blob_kind_bytes() {
        for kind in [BlobKind::Snapshot, BlobKind::Delta, BlobKind::ReverseDelta] {
            assert_eq!(BlobKind::from_byte(kind.to_byte()), Some(kind));
        }
        assert_eq!(BlobKind::from_byte(9), None);
        assert!(!BlobKind::Snapshot.is_delta());
        assert!(BlobKind::ReverseDelta.is_delta());
    }
}
