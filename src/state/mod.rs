//! The versioned state engine.
//!
//! Each registered type gets one double-buffered pool. Producers add
//! objects, seal, encode and advance; consumers install decoded blobs into
//! the loaded side and read typed objects back out.

mod engine;

pub use engine::{EngineConfig, LoadedObject, StateEngine};
