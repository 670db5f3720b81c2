//! Schema-bound record buffer.
//!
//! A `Record` sits between a domain object and its bytes for the length of
//! one serialize or deserialize call. Every field is written at most once and
//! every access is checked against the declared field kind, since a value
//! read under the wrong kind would shift every later field and corrupt
//! ordinal references.

use super::definition::{FieldKind, Schema};
use crate::error::{BlobError, Result};
use crate::io::wire::{WireReader, WireWriter};
use crate::types::Ordinal;
use std::any::Any;
use std::sync::Arc;

/// Hook used by records to turn referenced objects into ordinals and back.
///
/// The state engine implements this so that a codec can write a child
/// object into its own type's pool while serializing the parent.
pub trait ObjectLinker {
    /// Add `object` to `type_name`'s pool and return its ordinal.
    fn link(&self, type_name: &str, object: &dyn Any) -> Result<Ordinal>;

    /// Decode the loaded object at `ordinal` in `type_name`'s pool.
    fn resolve(&self, type_name: &str, ordinal: Ordinal) -> Result<Arc<dyn Any + Send + Sync>>;
}

/// Decoded value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Reference(Ordinal),
}

impl FieldValue {
    fn fits(&self, kind: &FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Bool(_), FieldKind::Bool)
                | (FieldValue::Int(_), FieldKind::Int)
                | (FieldValue::Long(_), FieldKind::Long)
                | (FieldValue::Float(_), FieldKind::Float)
                | (FieldValue::Double(_), FieldKind::Double)
                | (FieldValue::String(_), FieldKind::String)
                | (FieldValue::Bytes(_), FieldKind::Bytes)
                | (FieldValue::Reference(_), FieldKind::Reference { .. })
        )
    }

    fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "Bool",
            FieldValue::Int(_) => "Int",
            FieldValue::Long(_) => "Long",
            FieldValue::Float(_) => "Float",
            FieldValue::Double(_) => "Double",
            FieldValue::String(_) => "String",
            FieldValue::Bytes(_) => "Bytes",
            FieldValue::Reference(_) => "Reference",
        }
    }

    /// Encode a value, or null, for a field of `kind`.
    pub(crate) fn write(value: Option<&FieldValue>, w: &mut WireWriter) {
        match value {
            None => w.write_null(),
            Some(FieldValue::Bool(b)) => w.write_varint(u64::from(*b)),
            Some(FieldValue::Int(v)) => w.write_signed(i64::from(*v)),
            Some(FieldValue::Long(v)) => w.write_signed(*v),
            Some(FieldValue::Float(v)) => w.write_varint(u64::from(v.to_bits())),
            Some(FieldValue::Double(v)) => w.write_varint(v.to_bits()),
            Some(FieldValue::String(s)) => w.write_str(s),
            Some(FieldValue::Bytes(b)) => w.write_bytes(b),
            Some(FieldValue::Reference(o)) => w.write_ordinal(*o),
        }
    }

    /// Decode one field of `kind`, rejecting values outside the kind's range.
    pub(crate) fn read(kind: &FieldKind, r: &mut WireReader<'_>) -> Result<Option<FieldValue>> {
        if r.read_null() {
            return Ok(None);
        }
        let offset = r.position();
        let value = match kind {
            FieldKind::Bool => match r.read_varint()? {
                0 => FieldValue::Bool(false),
                1 => FieldValue::Bool(true),
                other => {
                    return Err(BlobError::InvalidFormat(format!(
                        "bool field holds {} at offset {}",
                        other, offset
                    )))
                }
            },
            FieldKind::Int => {
                let v = r.read_signed()?;
                FieldValue::Int(i32::try_from(v).map_err(|_| {
                    BlobError::InvalidFormat(format!(
                        "int field holds {} at offset {}",
                        v, offset
                    ))
                })?)
            }
            FieldKind::Long => FieldValue::Long(r.read_signed()?),
            FieldKind::Float => {
                let bits = r.read_varint()?;
                let bits = u32::try_from(bits).map_err(|_| {
                    BlobError::InvalidFormat(format!(
                        "float field holds {} bits at offset {}",
                        bits, offset
                    ))
                })?;
                FieldValue::Float(f32::from_bits(bits))
            }
            FieldKind::Double => FieldValue::Double(f64::from_bits(r.read_varint()?)),
            FieldKind::String => FieldValue::String(r.read_str()?.to_owned()),
            FieldKind::Bytes => FieldValue::Bytes(r.read_bytes()?.to_vec()),
            FieldKind::Reference { .. } => FieldValue::Reference(r.read_ordinal()?),
        };
        Ok(Some(value))
    }
}

/// Field values of one object, bound to its schema.
pub struct Record<'a> {
    schema: &'a Schema,
    values: Vec<Option<FieldValue>>,
    linker: Option<&'a dyn ObjectLinker>,
}

impl<'a> Record<'a> {
    /// Create an empty record with no reference support.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            values: vec![None; schema.len()],
            linker: None,
        }
    }

    /// Create an empty record that resolves references through `linker`.
    pub fn with_linker(schema: &'a Schema, linker: &'a dyn ObjectLinker) -> Self {
        Self {
            schema,
            values: vec![None; schema.len()],
            linker: Some(linker),
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    fn position(&self, field: &str) -> Result<usize> {
        self.schema
            .position(field)
            .ok_or_else(|| BlobError::UnknownField {
                type_name: self.schema.name().to_string(),
                field: field.to_string(),
            })
    }

    fn mismatch(&self, pos: usize, requested: &str) -> BlobError {
        let def = &self.schema.fields()[pos];
        BlobError::SchemaMismatch {
            type_name: self.schema.name().to_string(),
            field: def.name.clone(),
            declared: def.kind.to_string(),
            requested: requested.to_string(),
        }
    }

    /// Set a field. Each field may be written once.
    pub fn set(&mut self, field: &str, value: FieldValue) -> Result<()> {
        let pos = self.position(field)?;
        if !value.fits(&self.schema.fields()[pos].kind) {
            return Err(self.mismatch(pos, value.kind_name()));
        }
        if self.values[pos].is_some() {
            return Err(BlobError::FieldAlreadySet {
                type_name: self.schema.name().to_string(),
                field: field.to_string(),
            });
        }
        self.values[pos] = Some(value);
        Ok(())
    }

    pub fn set_bool(&mut self, field: &str, value: bool) -> Result<()> {
        self.set(field, FieldValue::Bool(value))
    }

    pub fn set_int(&mut self, field: &str, value: i32) -> Result<()> {
        self.set(field, FieldValue::Int(value))
    }

    pub fn set_long(&mut self, field: &str, value: i64) -> Result<()> {
        self.set(field, FieldValue::Long(value))
    }

    pub fn set_float(&mut self, field: &str, value: f32) -> Result<()> {
        self.set(field, FieldValue::Float(value))
    }

    pub fn set_double(&mut self, field: &str, value: f64) -> Result<()> {
        self.set(field, FieldValue::Double(value))
    }

    pub fn set_string(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        self.set(field, FieldValue::String(value.into()))
    }

    pub fn set_bytes(&mut self, field: &str, value: impl Into<Vec<u8>>) -> Result<()> {
        self.set(field, FieldValue::Bytes(value.into()))
    }

    pub fn set_reference(&mut self, field: &str, ordinal: Ordinal) -> Result<()> {
        self.set(field, FieldValue::Reference(ordinal))
    }

    /// Add `object` to the referenced type's pool and store its ordinal.
    pub fn set_object<T: Any>(&mut self, field: &str, object: &T) -> Result<()> {
        let pos = self.position(field)?;
        let type_name = match self.schema.fields()[pos].kind.referenced_type() {
            Some(t) => t.to_string(),
            None => return Err(self.mismatch(pos, "Reference")),
        };
        let linker = self.linker.ok_or_else(|| BlobError::UnresolvedReference {
            type_name: self.schema.name().to_string(),
            field: field.to_string(),
        })?;
        let ordinal = linker.link(&type_name, object)?;
        self.set_reference(field, ordinal)
    }

    /// Raw value of a field; `None` when absent.
    pub fn get(&self, field: &str) -> Result<Option<&FieldValue>> {
        let pos = self.position(field)?;
        Ok(self.values[pos].as_ref())
    }

    fn typed<'s, T>(
        &'s self,
        field: &str,
        requested: &str,
        accepts: impl Fn(&FieldKind) -> bool,
        extract: impl Fn(&'s FieldValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let pos = self.position(field)?;
        if !accepts(&self.schema.fields()[pos].kind) {
            return Err(self.mismatch(pos, requested));
        }
        Ok(self.values[pos].as_ref().and_then(extract))
    }

    pub fn get_bool(&self, field: &str) -> Result<Option<bool>> {
        self.typed(field, "Bool", |k| *k == FieldKind::Bool, |v| match v {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        })
    }

    pub fn get_int(&self, field: &str) -> Result<Option<i32>> {
        self.typed(field, "Int", |k| *k == FieldKind::Int, |v| match v {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        })
    }

    pub fn get_long(&self, field: &str) -> Result<Option<i64>> {
        self.typed(field, "Long", |k| *k == FieldKind::Long, |v| match v {
            FieldValue::Long(i) => Some(*i),
            _ => None,
        })
    }

    pub fn get_float(&self, field: &str) -> Result<Option<f32>> {
        self.typed(field, "Float", |k| *k == FieldKind::Float, |v| match v {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        })
    }

    pub fn get_double(&self, field: &str) -> Result<Option<f64>> {
        self.typed(field, "Double", |k| *k == FieldKind::Double, |v| match v {
            FieldValue::Double(f) => Some(*f),
            _ => None,
        })
    }

    pub fn get_str(&self, field: &str) -> Result<Option<&str>> {
        self.typed(field, "String", |k| *k == FieldKind::String, |v| match v {
            FieldValue::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn get_bytes(&self, field: &str) -> Result<Option<&[u8]>> {
        self.typed(field, "Bytes", |k| *k == FieldKind::Bytes, |v| match v {
            FieldValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        })
    }

    pub fn get_reference(&self, field: &str) -> Result<Option<Ordinal>> {
        self.typed(
            field,
            "Reference",
            |k| k.referenced_type().is_some(),
            |v| match v {
                FieldValue::Reference(o) => Some(*o),
                _ => None,
            },
        )
    }

    /// Decode the object a reference field points at.
    pub fn get_object<T: Any + Send + Sync>(&self, field: &str) -> Result<Option<Arc<T>>> {
        let Some(ordinal) = self.get_reference(field)? else {
            return Ok(None);
        };
        let pos = self.position(field)?;
        let type_name = self.schema.fields()[pos]
            .kind
            .referenced_type()
            .unwrap_or_default();
        let linker = self.linker.ok_or_else(|| BlobError::UnresolvedReference {
            type_name: self.schema.name().to_string(),
            field: field.to_string(),
        })?;
        let object = linker.resolve(type_name, ordinal)?;
        object
            .downcast::<T>()
            .map(Some)
            .map_err(|_| BlobError::ObjectTypeMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Referenced (type, ordinal) pairs held by this record.
    pub fn references(&self) -> impl Iterator<Item = (&'a str, Ordinal)> + '_ {
        let schema = self.schema;
        schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(def, value)| match (def.kind.referenced_type(), value) {
                (Some(t), Some(FieldValue::Reference(o))) => Some((t, *o)),
                _ => None,
            })
    }

    /// Encode all fields in schema order.
    pub fn encode(&self, w: &mut WireWriter) {
        for value in &self.values {
            FieldValue::write(value.as_ref(), w);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.encode(&mut w);
        w.into_inner()
    }

    /// Decode fields in schema order from the reader's position.
    pub fn decode(
        schema: &'a Schema,
        r: &mut WireReader<'_>,
        linker: Option<&'a dyn ObjectLinker>,
    ) -> Result<Self> {
        let mut values = Vec::with_capacity(schema.len());
        for def in schema.fields() {
            values.push(FieldValue::read(&def.kind, r)?);
        }
        Ok(Self {
            schema,
            values,
            linker,
        })
    }

    /// Decode a record that must span exactly `bytes`.
    pub fn from_bytes(
        schema: &'a Schema,
        bytes: &[u8],
        linker: Option<&'a dyn ObjectLinker>,
    ) -> Result<Self> {
        let mut r = WireReader::new(bytes);
        let record = Self::decode(schema, &mut r, linker)?;
        if !r.is_empty() {
            return Err(BlobError::InvalidFormat(format!(
                "{} trailing bytes after {} record",
                r.remaining(),
                schema.name()
            )));
        }
        Ok(record)
    }
}
