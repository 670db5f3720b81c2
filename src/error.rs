//! Error types for the state engine and blob codec.

use crate::types::Ordinal;
use thiserror::Error;

/// Main error type for engine, codec, and history operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Type not registered: {0}")]
    UnknownType(String),

    #[error("Type already registered: {0}")]
    DuplicateType(String),

    #[error("Field {field} not declared in schema {type_name}")]
    UnknownField { type_name: String, field: String },

    #[error("Field {field} declared twice in schema {type_name}")]
    DuplicateField { type_name: String, field: String },

    #[error("Schema mismatch on {type_name}.{field}: declared {declared}, accessed as {requested}")]
    SchemaMismatch {
        type_name: String,
        field: String,
        declared: String,
        requested: String,
    },

    #[error("Object for {type_name} is not a {expected}")]
    ObjectTypeMismatch {
        type_name: String,
        expected: &'static str,
    },

    #[error("Field {type_name}.{field} already written")]
    FieldAlreadySet { type_name: String, field: String },

    #[error("Reference field {type_name}.{field} has no engine to resolve against")]
    UnresolvedReference { type_name: String, field: String },

    #[error("Lifecycle misuse: {0}")]
    Lifecycle(String),

    #[error("Truncated blob: needed {needed} bytes at offset {offset}, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("Invalid blob format: {0}")]
    InvalidFormat(String),

    #[error("Invalid ordinal {ordinal} for type {type_name}: {reason}")]
    InvalidOrdinal {
        type_name: String,
        ordinal: Ordinal,
        reason: &'static str,
    },

    #[error("Schema fingerprint mismatch for {type_name}: blob has {found:08x}, schema is {expected:08x}")]
    SchemaFingerprint {
        type_name: String,
        expected: u32,
        found: u32,
    },

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BlobError {
    /// Whether this error came from decoding a malformed blob.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            BlobError::Truncated { .. }
                | BlobError::InvalidFormat(_)
                | BlobError::InvalidOrdinal { .. }
                | BlobError::SchemaFingerprint { .. }
                | BlobError::ChecksumMismatch { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, BlobError>;
