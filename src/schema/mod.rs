//! Record schemas and the record buffer codecs write through.
//!
//! A schema fixes the order and kind of a type's fields, which in turn fixes
//! the byte layout of every object of that type.

mod definition;
mod record;

pub use definition::{FieldDef, FieldKind, Schema};
pub use record::{FieldValue, ObjectLinker, Record};
