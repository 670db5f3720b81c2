//! Shared codecs and cycle helpers for the integration tests.

#![allow(dead_code)]

use fastblob::{
    BlobReader, BlobWriter, CodecRegistry, FieldDef, FieldKind, Record, Result, Schema,
    StateEngine, TypeCodec,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// --- TypeA: a keyed pair of ints ---

#[derive(Debug, Clone, PartialEq)]
pub struct TypeA {
    pub val1: i32,
    pub val2: i32,
}

impl TypeA {
    pub fn new(val1: i32, val2: i32) -> Self {
        Self { val1, val2 }
    }
}

pub struct TypeACodec {
    schema: Schema,
}

impl TypeACodec {
    pub fn new() -> Self {
        Self {
            schema: Schema::new(
                "TypeA",
                vec![
                    FieldDef::new("val1", FieldKind::Int),
                    FieldDef::new("val2", FieldKind::Int),
                ],
            )
            .unwrap(),
        }
    }
}

impl TypeCodec for TypeACodec {
    type Object = TypeA;

    fn type_name(&self) -> &str {
        "TypeA"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn serialize(&self, object: &TypeA, record: &mut Record<'_>) -> Result<()> {
        record.set_int("val1", object.val1)?;
        record.set_int("val2", object.val2)
    }

    fn deserialize(&self, record: &Record<'_>) -> Result<TypeA> {
        Ok(TypeA {
            val1: record.get_int("val1")?.unwrap_or_default(),
            val2: record.get_int("val2")?.unwrap_or_default(),
        })
    }
}

// --- Actor / Movie: a referencing pair covering every field kind ---

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub name: String,
}

pub struct ActorCodec {
    schema: Schema,
}

impl ActorCodec {
    pub fn new() -> Self {
        Self {
            schema: Schema::new("Actor", vec![FieldDef::new("name", FieldKind::String)]).unwrap(),
        }
    }
}

impl TypeCodec for ActorCodec {
    type Object = Actor;

    fn type_name(&self) -> &str {
        "Actor"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn serialize(&self, object: &Actor, record: &mut Record<'_>) -> Result<()> {
        record.set_string("name", object.name.as_str())
    }

    fn deserialize(&self, record: &Record<'_>) -> Result<Actor> {
        Ok(Actor {
            name: record.get_str("name")?.unwrap_or_default().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub released: bool,
    pub rating: Option<f64>,
    pub runtime: f32,
    pub poster: Vec<u8>,
    pub lead: Option<Actor>,
}

impl Movie {
    pub fn new(id: i64, title: &str, lead: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            released: true,
            rating: Some(7.5),
            runtime: 118.5,
            poster: vec![0xde, 0xad, id as u8],
            lead: Some(Actor {
                name: lead.to_string(),
            }),
        }
    }
}

pub struct MovieCodec {
    schema: Schema,
}

impl MovieCodec {
    pub fn new() -> Self {
        Self {
            schema: Schema::new(
                "Movie",
                vec![
                    FieldDef::new("id", FieldKind::Long),
                    FieldDef::new("title", FieldKind::String),
                    FieldDef::new("released", FieldKind::Bool),
                    FieldDef::new("rating", FieldKind::Double),
                    FieldDef::new("runtime", FieldKind::Float),
                    FieldDef::new("poster", FieldKind::Bytes),
                    FieldDef::new("lead", FieldKind::reference("Actor")),
                ],
            )
            .unwrap(),
        }
    }
}

impl TypeCodec for MovieCodec {
    type Object = Movie;

    fn type_name(&self) -> &str {
        "Movie"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn serialize(&self, object: &Movie, record: &mut Record<'_>) -> Result<()> {
        record.set_long("id", object.id)?;
        record.set_string("title", object.title.as_str())?;
        record.set_bool("released", object.released)?;
        if let Some(rating) = object.rating {
            record.set_double("rating", rating)?;
        }
        record.set_float("runtime", object.runtime)?;
        record.set_bytes("poster", object.poster.as_slice())?;
        if let Some(lead) = &object.lead {
            record.set_object("lead", lead)?;
        }
        Ok(())
    }

    fn deserialize(&self, record: &Record<'_>) -> Result<Movie> {
        Ok(Movie {
            id: record.get_long("id")?.unwrap_or_default(),
            title: record.get_str("title")?.unwrap_or_default().to_string(),
            released: record.get_bool("released")?.unwrap_or_default(),
            rating: record.get_double("rating")?,
            runtime: record.get_float("runtime")?.unwrap_or_default(),
            poster: record.get_bytes("poster")?.unwrap_or_default().to_vec(),
            lead: record.get_object::<Actor>("lead")?.map(|a| (*a).clone()),
        })
    }
}

pub fn registry() -> CodecRegistry {
    CodecRegistry::new()
        .with(ActorCodec::new())
        .unwrap()
        .with(MovieCodec::new())
        .unwrap()
        .with(TypeACodec::new())
        .unwrap()
}

pub fn engine() -> StateEngine {
    StateEngine::new(registry())
}

/// Seal the current version under `version`.
pub fn seal(engine: &StateEngine, version: &str) {
    engine.set_latest_version(version);
    engine.prepare_for_write();
}

pub fn snapshot(engine: &StateEngine) -> Vec<u8> {
    let mut out = Vec::new();
    BlobWriter::new(engine).write_snapshot(&mut out).unwrap();
    out
}

pub fn delta(engine: &StateEngine) -> Vec<u8> {
    let mut out = Vec::new();
    BlobWriter::new(engine).write_delta(&mut out).unwrap();
    out
}

pub fn reverse_delta(engine: &StateEngine) -> Vec<u8> {
    let mut out = Vec::new();
    BlobWriter::new(engine).write_reverse_delta(&mut out).unwrap();
    out
}

pub fn read_snapshot(engine: &StateEngine, blob: &[u8]) {
    BlobReader::new(engine).read_snapshot(&mut &blob[..]).unwrap();
}

pub fn read_delta(engine: &StateEngine, blob: &[u8]) {
    BlobReader::new(engine).read_delta(&mut &blob[..]).unwrap();
}

/// Loaded bytes of one type, ordinal-ascending.
pub fn loaded_bytes(engine: &StateEngine, type_name: &str) -> Vec<(u32, Vec<u8>)> {
    engine
        .loaded_content(type_name)
        .unwrap()
        .into_iter()
        .map(|(o, p)| (o.0, p.bytes.to_vec()))
        .collect()
}

/// Current bytes of one type, ordinal-ascending.
pub fn current_bytes(engine: &StateEngine, type_name: &str) -> Vec<(u32, Vec<u8>)> {
    engine
        .current_content(type_name)
        .unwrap()
        .into_iter()
        .map(|(o, p)| (o.0, p.bytes.to_vec()))
        .collect()
}
