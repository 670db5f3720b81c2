//! Ordered registry of type codecs.

use super::{ErasedCodec, TypeCodec};
use crate::error::{BlobError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Registered codecs in their fixed wire order.
///
/// A type must be registered after every type its schema references, so
/// that encoding and decoding in registration order always meets a
/// referenced pool before the pools pointing into it.
#[derive(Default, Clone)]
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn ErasedCodec>>,
    by_name: HashMap<String, usize>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec, builder-style.
    pub fn with<C: TypeCodec>(mut self, codec: C) -> Result<Self> {
        self.register(codec)?;
        Ok(self)
    }

    /// Register a codec at the end of the type order.
    pub fn register<C: TypeCodec>(&mut self, codec: C) -> Result<()> {
        let name = TypeCodec::type_name(&codec).to_string();
        if self.by_name.contains_key(&name) {
            return Err(BlobError::DuplicateType(name));
        }
        if TypeCodec::schema(&codec).name() != name {
            return Err(BlobError::InvalidConfig(format!(
                "codec {} carries schema for {}",
                name,
                TypeCodec::schema(&codec).name()
            )));
        }
        for referenced in TypeCodec::schema(&codec).references() {
            if !self.by_name.contains_key(referenced) {
                return Err(BlobError::InvalidConfig(format!(
                    "{} references {}, which must be registered first",
                    name, referenced
                )));
            }
        }
        self.by_name.insert(name, self.codecs.len());
        self.codecs.push(Arc::new(codec));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Position of a type in wire order.
    pub fn index_of(&self, type_name: &str) -> Option<usize> {
        self.by_name.get(type_name).copied()
    }

    /// Type names in wire order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.codecs.iter().map(|c| c.type_name())
    }

    pub(crate) fn codec(&self, index: usize) -> &Arc<dyn ErasedCodec> {
        &self.codecs[index]
    }
}
