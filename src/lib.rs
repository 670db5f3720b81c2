//! # Fastblob
//!
//! A versioned object-pool state engine. Typed objects are serialized
//! through per-type codecs, deduplicated into ordinals, and shipped as
//! compact snapshot or delta blobs.
//!
//! ## Core Concepts
//!
//! - **Codecs**: map a domain type to a schema-ordered `Record`
//! - **Pools**: identical bytes share one ordinal, stable across versions
//! - **Blobs**: full snapshots or add/remove deltas between versions
//! - **History**: per-key transitions over a bounded window of versions
//!
//! ## Example
//!
//! ```ignore
//! use fastblob::{BlobReader, BlobWriter, CodecRegistry, StateEngine};
//!
//! let engine = StateEngine::new(CodecRegistry::new().with(MovieCodec::new())?);
//!
//! // Producer cycle
//! engine.add("Movie", &movie)?;
//! engine.set_latest_version("20261016");
//! engine.prepare_for_write();
//! let mut blob = Vec::new();
//! BlobWriter::new(&engine).write_snapshot(&mut blob)?;
//! engine.prepare_for_next_cycle();
//!
//! // Consumer
//! let consumer = StateEngine::new(registry);
//! BlobReader::new(&consumer).read_snapshot(&mut blob.as_slice())?;
//! let movies = consumer.loaded_objects::<Movie>("Movie")?;
//! ```

pub mod diff;
pub mod error;
pub mod io;
pub mod pool;
pub mod schema;
pub mod serializer;
pub mod state;
pub mod types;

// Re-exports
pub use diff::{
    DiffInstruction, HistoricalState, HistoryTracker, TransitionKind, TransitionRecord,
    TypeChangeSummary, TypeDiffInstruction,
};
pub use error::{BlobError, Result};
pub use io::{BlobHeader, BlobReader, BlobWriter};
pub use pool::{CycleStats, LoadedObjects, ObjectPool, OrdinalMap, PoolInsert, PooledObject};
pub use schema::{FieldDef, FieldKind, FieldValue, ObjectLinker, Record, Schema};
pub use serializer::{CodecRegistry, TypeCodec};
pub use state::{EngineConfig, LoadedObject, StateEngine};
pub use types::*;
