//! Schema definition.

use crate::error::{BlobError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Kind of value a field holds, which also fixes its wire encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Bytes,
    /// Ordinal of an object in another type's pool.
    Reference {
        #[serde(rename = "type")]
        type_name: String,
    },
}

impl FieldKind {
    pub fn reference(type_name: impl Into<String>) -> Self {
        FieldKind::Reference {
            type_name: type_name.into(),
        }
    }

    /// Referenced type, if this is a reference field.
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            FieldKind::Reference { type_name } => Some(type_name),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Int => write!(f, "Int"),
            FieldKind::Long => write!(f, "Long"),
            FieldKind::Float => write!(f, "Float"),
            FieldKind::Double => write!(f, "Double"),
            FieldKind::String => write!(f, "String"),
            FieldKind::Bytes => write!(f, "Bytes"),
            FieldKind::Reference { type_name } => write!(f, "Reference({})", type_name),
        }
    }
}

/// One named field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Deserialize)]
struct SchemaDef {
    name: String,
    fields: Vec<FieldDef>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = BlobError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        Schema::new(def.name, def.fields)
    }
}

/// Ordered field layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef")]
pub struct Schema {
    name: String,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Create a schema, rejecting duplicate field names.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(BlobError::DuplicateField {
                    type_name: name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self { name, fields })
    }

    /// Type name this schema describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field in encoding order.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == field)
    }

    pub fn field_kind(&self, field: &str) -> Option<&FieldKind> {
        self.fields.iter().find(|f| f.name == field).map(|f| &f.kind)
    }

    /// Referenced type names, in field order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| f.kind.referenced_type())
    }

    /// CRC-32 over the canonical field layout.
    ///
    /// Written into every type section so a reader refuses bytes laid out
    /// for a different schema.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.name.as_bytes());
        for field in &self.fields {
            hasher.update(&[0]);
            hasher.update(field.name.as_bytes());
            hasher.update(&[0]);
            hasher.update(field.kind.to_string().as_bytes());
        }
        hasher.finalize()
    }
}
