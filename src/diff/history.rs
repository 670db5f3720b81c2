//! Bounded per-key transition history across loaded versions.

use super::instruction::DiffInstruction;
use crate::error::{BlobError, Result};
use crate::state::StateEngine;
use crate::types::Hash as Fingerprint;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

/// How one key changed between two consecutive versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Added,
    Removed,
    /// Present on both sides with different serialized content.
    Modified,
    Unchanged,
}

/// One key's state at two consecutive versions.
pub struct TransitionRecord<T> {
    /// Version identifier of the `after` side.
    pub version: Option<Arc<str>>,
    pub before: Option<Arc<T>>,
    pub after: Option<Arc<T>>,
    pub kind: TransitionKind,
}

impl<T> TransitionRecord<T> {
    fn new(version: Option<Arc<str>>, before: Option<&Keyed<T>>, after: Option<&Keyed<T>>) -> Self {
        let kind = match (before, after) {
            (None, Some(_)) => TransitionKind::Added,
            (Some(_), None) => TransitionKind::Removed,
            (Some(b), Some(a)) if b.fingerprint != a.fingerprint => TransitionKind::Modified,
            _ => TransitionKind::Unchanged,
        };
        Self {
            version,
            before: before.map(|k| Arc::clone(&k.object)),
            after: after.map(|k| Arc::clone(&k.object)),
            kind,
        }
    }
}

impl<T> Clone for TransitionRecord<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            kind: self.kind,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TransitionRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRecord")
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

/// Change counts for one type in one version advance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeChangeSummary {
    pub type_name: String,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
}

impl TypeChangeSummary {
    fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    fn count(&mut self, kind: TransitionKind) {
        match kind {
            TransitionKind::Added => self.added += 1,
            TransitionKind::Removed => self.removed += 1,
            TransitionKind::Modified => self.modified += 1,
            TransitionKind::Unchanged => self.unchanged += 1,
        }
    }
}

/// Summary of one recorded version advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalState {
    pub version: Option<String>,
    pub types: Vec<TypeChangeSummary>,
}

impl HistoricalState {
    pub fn type_summary(&self, type_name: &str) -> Option<&TypeChangeSummary> {
        self.types.iter().find(|t| t.type_name == type_name)
    }
}

/// Fixed-capacity FIFO of transitions; the oldest entry is evicted first.
struct KeyHistory<T> {
    entries: VecDeque<TransitionRecord<T>>,
    capacity: usize,
}

impl<T> KeyHistory<T> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, transition: TransitionRecord<T>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }
}

struct Keyed<T> {
    object: Arc<T>,
    fingerprint: Fingerprint,
}

/// Per-type tracking state, erased so one tracker can hold many types.
///
/// Observing a version is two-phase: `stage` decodes the loaded objects and
/// may fail, `commit` folds them into the histories and cannot.
pub(crate) trait TypeTracker: Send + Sync {
    fn type_name(&self) -> &str;

    fn stage(&mut self, engine: &StateEngine) -> Result<()>;

    fn discard(&mut self);

    fn commit(&mut self, version: Option<Arc<str>>, record: bool) -> TypeChangeSummary;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct TypeHistory<T, K> {
    type_name: String,
    key: Arc<dyn Fn(&T) -> K + Send + Sync>,
    max_depth: usize,
    baseline: HashMap<K, Keyed<T>>,
    staged: Option<HashMap<K, Keyed<T>>>,
    histories: HashMap<K, KeyHistory<T>>,
}

impl<T, K> TypeHistory<T, K>
where
    T: Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub(crate) fn new(type_name: String, key: Arc<dyn Fn(&T) -> K + Send + Sync>, max_depth: usize) -> Self {
        Self {
            type_name,
            key,
            max_depth,
            baseline: HashMap::new(),
            staged: None,
            histories: HashMap::new(),
        }
    }

    fn history(&self, key: &K) -> Vec<TransitionRecord<T>> {
        self.histories
            .get(key)
            .map(|h| h.entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T, K> TypeTracker for TypeHistory<T, K>
where
    T: Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn stage(&mut self, engine: &StateEngine) -> Result<()> {
        let objects = engine.loaded_objects::<T>(&self.type_name)?;
        let mut keyed = HashMap::with_capacity(objects.len());

        // Ordinal-ascending, so the highest ordinal wins on a duplicate key.
        for loaded in objects {
            let key = (self.key)(&loaded.object);
            let replaced = keyed.insert(
                key,
                Keyed {
                    object: loaded.object,
                    fingerprint: loaded.fingerprint,
                },
            );
            if replaced.is_some() {
                warn!(
                    type_name = %self.type_name,
                    ordinal = %loaded.ordinal,
                    "duplicate key within one version, keeping the higher ordinal"
                );
            }
        }
        self.staged = Some(keyed);
        Ok(())
    }

    fn discard(&mut self) {
        self.staged = None;
    }

    fn commit(&mut self, version: Option<Arc<str>>, record: bool) -> TypeChangeSummary {
        let mut summary = TypeChangeSummary::new(&self.type_name);
        let Some(current) = self.staged.take() else {
            return summary;
        };

        if record {
            let max_depth = self.max_depth;
            let keys = self.baseline.keys().chain(current.keys().filter(|k| !self.baseline.contains_key(*k)));
            for key in keys {
                let transition = TransitionRecord::new(version.clone(), self.baseline.get(key), current.get(key));
                summary.count(transition.kind);
                self.histories
                    .entry(key.clone())
                    .or_insert_with(|| KeyHistory::new(max_depth))
                    .push(transition);
            }
        }

        self.baseline = current;
        summary
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Follows consecutive loaded versions of a `StateEngine` and keeps, per
/// (type, key), the most recent `max_depth` transitions.
///
/// Call `add_state` once after every version has been read into the engine.
/// The first call only establishes a baseline. Every later call records one
/// transition for each key present in the previous or the new version, even
/// if its content did not change.
pub struct HistoryTracker {
    max_depth: usize,
    engine: Arc<StateEngine>,
    types: Vec<Box<dyn TypeTracker>>,
    states: VecDeque<HistoricalState>,
    tracking: bool,
}

impl HistoryTracker {
    pub fn new(max_depth: usize, engine: Arc<StateEngine>, instruction: DiffInstruction) -> Result<Self> {
        if max_depth == 0 {
            return Err(BlobError::InvalidConfig("history depth must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        let mut types = Vec::with_capacity(instruction.len());
        for entry in instruction.instructions() {
            let name = entry.type_name();
            if engine.registry().index_of(name).is_none() {
                return Err(BlobError::UnknownType(name.to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(BlobError::DuplicateType(name.to_string()));
            }
            types.push(entry.tracker(max_depth));
        }

        Ok(Self {
            max_depth,
            engine,
            types,
            states: VecDeque::with_capacity(max_depth),
            tracking: false,
        })
    }

    /// Observe the engine's loaded version.
    ///
    /// On error nothing is recorded and the previous baseline is kept.
    pub fn add_state(&mut self) -> Result<()> {
        let engine = &self.engine;
        if let Err(e) = self.types.iter_mut().try_for_each(|t| t.stage(engine)) {
            self.types.iter_mut().for_each(|t| t.discard());
            return Err(e);
        }

        let version = self.engine.loaded_version();
        let shared: Option<Arc<str>> = version.as_deref().map(Arc::from);
        let record = self.tracking;
        let summaries: Vec<TypeChangeSummary> = self
            .types
            .iter_mut()
            .map(|t| t.commit(shared.clone(), record))
            .collect();

        if !record {
            self.tracking = true;
            debug!(version = ?version, "history baseline established");
            return Ok(());
        }

        for s in &summaries {
            debug!(
                version = ?version,
                type_name = %s.type_name,
                added = s.added,
                removed = s.removed,
                modified = s.modified,
                unchanged = s.unchanged,
                "history recorded"
            );
        }
        if self.states.len() == self.max_depth {
            self.states.pop_front();
        }
        self.states.push_back(HistoricalState {
            version,
            types: summaries,
        });
        Ok(())
    }

    /// Transitions recorded for one key, oldest first.
    ///
    /// An unobserved key yields an empty list. `T` and `K` must match the
    /// types of the `TypeDiffInstruction` the type was tracked with.
    pub fn object_history<T, K>(&self, type_name: &str, key: &K) -> Result<Vec<TransitionRecord<T>>>
    where
        T: Send + Sync + 'static,
        K: Eq + Hash + Clone + Send + Sync + 'static,
    {
        let tracker = self
            .types
            .iter()
            .find(|t| t.type_name() == type_name)
            .ok_or_else(|| BlobError::UnknownType(type_name.to_string()))?;
        let history = tracker
            .as_any()
            .downcast_ref::<TypeHistory<T, K>>()
            .ok_or_else(|| BlobError::ObjectTypeMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<(T, K)>(),
            })?;
        Ok(history.history(key))
    }

    /// Recorded version summaries, oldest first.
    pub fn historical_states(&self) -> impl Iterator<Item = &HistoricalState> {
        self.states.iter()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether a baseline has been established.
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn tracked_types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|t| t.type_name())
    }

    pub fn engine(&self) -> &Arc<StateEngine> {
        &self.engine
    }
}

impl fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("max_depth", &self.max_depth)
            .field("types", &self.tracked_types().collect::<Vec<_>>())
            .field("states", &self.states.len())
            .field("tracking", &self.tracking)
            .finish()
    }
}
