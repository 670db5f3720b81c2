//! Per-type codecs translating domain objects to and from records.

mod registry;

pub use registry::CodecRegistry;

use crate::error::{BlobError, Result};
use crate::schema::{Record, Schema};
use std::any::Any;
use std::sync::Arc;

/// Bidirectional mapping between one domain type and its record form.
///
/// The type name is the lookup key used by the engine, writer, reader and
/// history tracker.
pub trait TypeCodec: Send + Sync + 'static {
    type Object: Send + Sync + 'static;

    fn type_name(&self) -> &str;

    fn schema(&self) -> &Schema;

    fn serialize(&self, object: &Self::Object, record: &mut Record<'_>) -> Result<()>;

    fn deserialize(&self, record: &Record<'_>) -> Result<Self::Object>;
}

/// Object-safe view of a `TypeCodec`, stored in the registry.
pub(crate) trait ErasedCodec: Send + Sync {
    fn type_name(&self) -> &str;

    fn schema(&self) -> &Schema;

    fn serialize_any(&self, object: &dyn Any, record: &mut Record<'_>) -> Result<()>;

    fn deserialize_any(&self, record: &Record<'_>) -> Result<Arc<dyn Any + Send + Sync>>;
}

impl<C: TypeCodec> ErasedCodec for C {
    fn type_name(&self) -> &str {
        TypeCodec::type_name(self)
    }

    fn schema(&self) -> &Schema {
        TypeCodec::schema(self)
    }

    fn serialize_any(&self, object: &dyn Any, record: &mut Record<'_>) -> Result<()> {
        let object = object
            .downcast_ref::<C::Object>()
            .ok_or_else(|| BlobError::ObjectTypeMismatch {
                type_name: TypeCodec::type_name(self).to_string(),
                expected: std::any::type_name::<C::Object>(),
            })?;
        self.serialize(object, record)
    }

    fn deserialize_any(&self, record: &Record<'_>) -> Result<Arc<dyn Any + Send + Sync>> {
        Ok(Arc::new(self.deserialize(record)?))
    }
}
