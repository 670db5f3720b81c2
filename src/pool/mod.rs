//! Per-type object pools with ordinal-based deduplication.
//!
//! Identical serialized content always maps to one ordinal within a version,
//! and keeps that ordinal for as long as consecutive versions contain it.

mod object_pool;
mod ordinal_map;

pub use object_pool::{CycleStats, LoadedObjects, ObjectPool, PoolInsert, PooledObject};
pub use ordinal_map::OrdinalMap;
