//! Natural-key extractors used to correlate objects across versions.

use super::history::{TypeHistory, TypeTracker};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Key extractor for one registered type.
pub struct TypeDiffInstruction<T, K> {
    type_name: String,
    key: KeyFn<T, K>,
}

impl<T, K> TypeDiffInstruction<T, K>
where
    T: Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// `key` must be stable for an object's identity and unique within one version.
    pub fn new(type_name: impl Into<String>, key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
        Self {
            type_name: type_name.into(),
            key: Arc::new(key),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self, object: &T) -> K {
        (self.key)(object)
    }
}

impl<T, K> Clone for TypeDiffInstruction<T, K> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            key: Arc::clone(&self.key),
        }
    }
}

impl<T, K> fmt::Debug for TypeDiffInstruction<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDiffInstruction")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Type-erased instruction that can spawn its own history tracker.
pub(crate) trait ErasedInstruction: Send + Sync {
    fn type_name(&self) -> &str;

    fn tracker(&self, max_depth: usize) -> Box<dyn TypeTracker>;
}

impl<T, K> ErasedInstruction for TypeDiffInstruction<T, K>
where
    T: Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn tracker(&self, max_depth: usize) -> Box<dyn TypeTracker> {
        Box::new(TypeHistory::new(
            self.type_name.clone(),
            Arc::clone(&self.key),
            max_depth,
        ))
    }
}

/// The set of types a `HistoryTracker` follows. Types not listed are ignored.
#[derive(Clone, Default)]
pub struct DiffInstruction {
    types: Vec<Arc<dyn ErasedInstruction>>,
}

impl DiffInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type, builder-style.
    pub fn with<T, K>(mut self, instruction: TypeDiffInstruction<T, K>) -> Self
    where
        T: Send + Sync + 'static,
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        self.add(instruction);
        self
    }

    pub fn add<T, K>(&mut self, instruction: TypeDiffInstruction<T, K>)
    where
        T: Send + Sync + 'static,
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        self.types.push(Arc::new(instruction));
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.type_name())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn instructions(&self) -> &[Arc<dyn ErasedInstruction>] {
        &self.types
    }
}

impl fmt::Debug for DiffInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}
