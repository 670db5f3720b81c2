//! The state engine tying codecs and pools together.

use crate::error::{BlobError, Result};
use crate::pool::{LoadedObjects, ObjectPool, PoolInsert, PooledObject};
use crate::schema::{ObjectLinker, Record};
use crate::serializer::CodecRegistry;
use crate::types::{Hash, Ordinal};
use lru::LruCache;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Decoded objects kept in the LRU cache. `None` disables caching.
    pub object_cache_size: Option<NonZeroUsize>,

    /// Whether readers verify the CRC-32 footer of incoming blobs.
    pub verify_checksums: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            object_cache_size: NonZeroUsize::new(4096),
            verify_checksums: true,
        }
    }
}

/// A decoded object from the loaded version.
#[derive(Debug)]
pub struct LoadedObject<T> {
    pub ordinal: Ordinal,
    /// Fingerprint of the object's serialized bytes.
    pub fingerprint: Hash,
    pub object: Arc<T>,
}

impl<T> Clone for LoadedObject<T> {
    fn clone(&self) -> Self {
        Self {
            ordinal: self.ordinal,
            fingerprint: self.fingerprint,
            object: Arc::clone(&self.object),
        }
    }
}

type CacheKey = (usize, Hash);

/// Versioned object-pool state engine.
///
/// Holds one `ObjectPool` per registered type. A producer cycle is:
/// - `add` every object of the new version
/// - `set_latest_version`, then `prepare_for_write`
/// - encode with a `BlobWriter`
/// - `prepare_for_next_cycle`
///
/// Consumers fill the loaded side of the pools with a `BlobReader` and read
/// it back with `loaded_objects`. Methods take `&self` so the engine can be
/// shared with a `HistoryTracker`; the cycle phases themselves must still be
/// driven by a single caller in order.
pub struct StateEngine {
    config: EngineConfig,
    registry: CodecRegistry,
    pools: Vec<RwLock<ObjectPool>>,
    sealed: RwLock<bool>,
    latest_version: RwLock<Option<String>>,
    loaded_version: RwLock<Option<String>>,
    header_tags: RwLock<BTreeMap<String, String>>,
    object_cache: Option<Mutex<LruCache<CacheKey, Arc<dyn Any + Send + Sync>>>>,
}

impl StateEngine {
    /// Create an engine with default configuration.
    pub fn new(registry: CodecRegistry) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: CodecRegistry, config: EngineConfig) -> Self {
        let pools = registry
            .type_names()
            .map(|name| RwLock::new(ObjectPool::new(name)))
            .collect();
        let object_cache = config
            .object_cache_size
            .map(|size| Mutex::new(LruCache::new(size)));

        Self {
            config,
            registry,
            pools,
            sealed: RwLock::new(false),
            latest_version: RwLock::new(None),
            loaded_version: RwLock::new(None),
            header_tags: RwLock::new(BTreeMap::new()),
            object_cache,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Registered type names in wire order.
    pub fn type_names(&self) -> Vec<String> {
        self.registry.type_names().map(str::to_string).collect()
    }

    pub(crate) fn type_index(&self, type_name: &str) -> Result<usize> {
        self.registry
            .index_of(type_name)
            .ok_or_else(|| BlobError::UnknownType(type_name.to_string()))
    }

    // --- Producer cycle ---

    /// Serialize `object` through its type's codec and add it to the current version.
    ///
    /// Objects referenced via `Record::set_object` are added to their own
    /// pools first. If any codec in the tree fails, every insert made by
    /// this call is undone.
    pub fn add<T: Any>(&self, type_name: &str, object: &T) -> Result<Ordinal> {
        self.add_any(type_name, object)
    }

    fn add_any(&self, type_name: &str, object: &dyn Any) -> Result<Ordinal> {
        let scope = AddScope {
            engine: self,
            inserted: RefCell::new(Vec::new()),
        };
        let result = self.add_in(&scope, type_name, object);
        if result.is_err() {
            let inserted = scope.inserted.into_inner();
            debug!(type_name, undone = inserted.len(), "rolled back failed add");
            for (index, insert) in inserted.into_iter().rev() {
                self.pools[index].write().undo(insert);
            }
        }
        result
    }

    fn add_in(&self, scope: &AddScope<'_>, type_name: &str, object: &dyn Any) -> Result<Ordinal> {
        let index = self.type_index(type_name)?;
        if *self.sealed.read() {
            return Err(BlobError::Lifecycle(format!(
                "cannot add {} after prepare_for_write; call prepare_for_next_cycle first",
                type_name
            )));
        }

        let codec = Arc::clone(self.registry.codec(index));
        let mut record = Record::with_linker(codec.schema(), scope);
        codec.serialize_any(object, &mut record)?;
        let bytes = record.to_bytes();

        let insert = self.pools[index].write().insert(&bytes)?;
        scope.inserted.borrow_mut().push((index, insert));
        trace!(type_name, ordinal = %insert.ordinal, len = bytes.len(), "added object");
        Ok(insert.ordinal)
    }

    /// Record the version identifier of the cycle about to be written.
    pub fn set_latest_version(&self, version: impl Into<String>) {
        *self.latest_version.write() = Some(version.into());
    }

    pub fn latest_version(&self) -> Option<String> {
        self.latest_version.read().clone()
    }

    /// Attach a key/value tag to the header of blobs written from now on.
    pub fn add_header_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.header_tags.write().insert(key.into(), value.into());
    }

    pub fn header_tags(&self) -> BTreeMap<String, String> {
        self.header_tags.read().clone()
    }

    /// Seal every pool for encoding. No adds until `prepare_for_next_cycle`.
    pub fn prepare_for_write(&self) {
        let mut sealed = self.sealed.write();
        for pool in &self.pools {
            pool.write().seal();
        }
        *sealed = true;
        debug!(version = ?self.latest_version(), "prepared for write");
    }

    pub fn is_sealed(&self) -> bool {
        *self.sealed.read()
    }

    /// Advance every pool: current becomes previous and a fresh current begins.
    pub fn prepare_for_next_cycle(&self) {
        let mut sealed = self.sealed.write();
        for pool in &self.pools {
            let mut pool = pool.write();
            let stats = pool.prepare_for_next_cycle();
            debug!(
                type_name = pool.type_name(),
                added = stats.added,
                removed = stats.removed,
                retained = stats.retained,
                "advanced pool"
            );
        }
        *sealed = false;
    }

    /// Current version of one type as ordinal → bytes.
    pub fn current_content(&self, type_name: &str) -> Result<LoadedObjects> {
        let index = self.type_index(type_name)?;
        Ok(self.pools[index].read().current_objects())
    }

    /// Number of objects in the current version of one type.
    pub fn current_len(&self, type_name: &str) -> Result<usize> {
        let index = self.type_index(type_name)?;
        Ok(self.pools[index].read().current_len())
    }

    // --- Loaded (reader-side) state ---

    /// Loaded version of one type as ordinal → bytes.
    pub fn loaded_content(&self, type_name: &str) -> Result<LoadedObjects> {
        let index = self.type_index(type_name)?;
        Ok(self.pools[index].read().loaded().clone())
    }

    /// Version identifier carried by the last blob read, or copied by `load_from_current`.
    pub fn loaded_version(&self) -> Option<String> {
        self.loaded_version.read().clone()
    }

    /// Make the current version the loaded one without encoding it.
    pub fn load_from_current(&self) {
        let staged = self
            .pools
            .iter()
            .map(|pool| pool.read().current_objects())
            .collect();
        self.install_loaded(staged, self.latest_version());
    }

    /// Decode every loaded object of one type, ordinal-ascending.
    pub fn loaded_objects<T: Any + Send + Sync>(&self, type_name: &str) -> Result<Vec<LoadedObject<T>>> {
        let index = self.type_index(type_name)?;
        let loaded = self.pools[index].read().loaded().clone();

        let mut objects = Vec::with_capacity(loaded.len());
        for (ordinal, pooled) in loaded {
            let object = self.decode_object(index, &pooled)?;
            let object = object
                .downcast::<T>()
                .map_err(|_| BlobError::ObjectTypeMismatch {
                    type_name: type_name.to_string(),
                    expected: std::any::type_name::<T>(),
                })?;
            objects.push(LoadedObject {
                ordinal,
                fingerprint: pooled.fingerprint,
                object,
            });
        }
        Ok(objects)
    }

    /// Decode one loaded object by ordinal.
    pub fn loaded_object<T: Any + Send + Sync>(&self, type_name: &str, ordinal: Ordinal) -> Result<Option<Arc<T>>> {
        let index = self.type_index(type_name)?;
        let Some(pooled) = self.pools[index].read().loaded().get(&ordinal).cloned() else {
            return Ok(None);
        };
        self.decode_object(index, &pooled)?
            .downcast::<T>()
            .map(Some)
            .map_err(|_| BlobError::ObjectTypeMismatch {
                type_name: type_name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Decode through the codec, caching by content fingerprint.
    ///
    /// Types with reference fields bypass the cache: identical bytes can
    /// point at a reused child ordinal whose content differs between versions.
    fn decode_object(&self, index: usize, pooled: &PooledObject) -> Result<Arc<dyn Any + Send + Sync>> {
        let codec = Arc::clone(self.registry.codec(index));
        let cacheable = codec.schema().references().next().is_none();
        let key = (index, pooled.fingerprint);

        let cache = self.object_cache.as_ref().filter(|_| cacheable);

        if let Some(cache) = cache {
            if let Some(hit) = cache.lock().get(&key).cloned() {
                return Ok(hit);
            }
        }

        let record = Record::from_bytes(codec.schema(), &pooled.bytes, Some(self))?;
        let object = codec.deserialize_any(&record)?;

        if let Some(cache) = cache {
            cache.lock().put(key, Arc::clone(&object));
        }
        Ok(object)
    }

    // --- Crate-internal access for the codec ---

    pub(crate) fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub(crate) fn read_pool(&self, index: usize) -> RwLockReadGuard<'_, ObjectPool> {
        self.pools[index].read()
    }

    /// Loaded state of every type, in wire order.
    pub(crate) fn loaded_state(&self) -> Vec<LoadedObjects> {
        self.pools.iter().map(|p| p.read().loaded().clone()).collect()
    }

    /// Replace the loaded state of every pool at once.
    pub(crate) fn install_loaded(&self, staged: Vec<LoadedObjects>, version: Option<String>) {
        let mut guards: Vec<RwLockWriteGuard<'_, ObjectPool>> =
            self.pools.iter().map(|p| p.write()).collect();
        let mut version_slot = self.loaded_version.write();

        for (guard, loaded) in guards.iter_mut().zip(staged) {
            guard.replace_loaded(loaded);
        }
        *version_slot = version;
        info!(version = ?version_slot.as_deref(), types = guards.len(), "installed loaded state");
    }
}

impl ObjectLinker for StateEngine {
    fn link(&self, type_name: &str, object: &dyn Any) -> Result<Ordinal> {
        self.add_any(type_name, object)
    }

    fn resolve(&self, type_name: &str, ordinal: Ordinal) -> Result<Arc<dyn Any + Send + Sync>> {
        let index = self.type_index(type_name)?;
        let pooled = self.pools[index]
            .read()
            .loaded()
            .get(&ordinal)
            .cloned()
            .ok_or_else(|| BlobError::InvalidOrdinal {
                type_name: type_name.to_string(),
                ordinal,
                reason: "not present in the loaded version",
            })?;
        self.decode_object(index, &pooled)
    }
}

/// Inserts made during one top-level `add`, newest last.
struct AddScope<'e> {
    engine: &'e StateEngine,
    inserted: RefCell<Vec<(usize, PoolInsert)>>,
}

impl ObjectLinker for AddScope<'_> {
    fn link(&self, type_name: &str, object: &dyn Any) -> Result<Ordinal> {
        self.engine.add_in(self, type_name, object)
    }

    fn resolve(&self, type_name: &str, ordinal: Ordinal) -> Result<Arc<dyn Any + Send + Sync>> {
        ObjectLinker::resolve(self.engine, type_name, ordinal)
    }
}
