//! Blob wire format.
//!
//! A blob is a header (magic, format version, kind, producer version,
//! tags, type count), one section per registered type in registry order,
//! and a CRC-32 footer. A snapshot section lists every object as
//! `ordinal, fields`; a delta section lists removed ordinals followed by
//! added objects. A reverse delta is a delta with the two lists swapped.

mod header;
mod reader;
pub mod wire;
mod writer;

pub use header::{BlobHeader, BLOB_MAGIC, BLOB_VERSION};
pub use reader::BlobReader;
pub use writer::BlobWriter;
