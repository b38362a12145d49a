//! Thread-safe wrapper around [`ValueMap`].
//!
//! Holds the map behind a `parking_lot::RwLock`. A write lock covers the whole
//! paired update of the value store and the key registry, so other threads
//! never observe one without the other.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::canonical::Canonicalizer;
use crate::error::SerializationError;
use crate::key::Key;
use crate::{Config, ValueMap};

/// A [`ValueMap`] that can be shared across threads.
///
/// Reads return clones, since references cannot outlive the lock guard.
pub struct SharedValueMap<V> {
    inner: RwLock<ValueMap<V>>,
}

impl<V> SharedValueMap<V> {
    /// Create a new empty map with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new empty map with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self::from_map(ValueMap::with_config(config))
    }

    pub fn with_canonicalizer(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self::from_map(ValueMap::with_canonicalizer(canonicalizer))
    }

    pub fn from_map(map: ValueMap<V>) -> Self {
        Self {
            inner: RwLock::new(map),
        }
    }

    pub fn into_inner(self) -> ValueMap<V> {
        self.inner.into_inner()
    }

    /// Insert or overwrite. Returns the previous value if the key existed.
    pub fn insert(&self, key: impl Into<Key>, value: V) -> Result<Option<V>, SerializationError> {
        self.inner.write().insert(key, value)
    }

    /// Insert or overwrite, returning `self` for chaining.
    pub fn set(&self, key: impl Into<Key>, value: V) -> Result<&Self, SerializationError> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Check if a key exists in the map.
    pub fn has(&self, key: &Key) -> Result<bool, SerializationError> {
        self.inner.read().has(key)
    }

    /// Remove a key, returning whether it existed.
    pub fn delete(&self, key: &Key) -> Result<bool, SerializationError> {
        self.inner.write().delete(key)
    }

    /// Remove a key, returning the stored original key and value.
    pub fn remove(&self, key: &Key) -> Result<Option<(Key, V)>, SerializationError> {
        self.inner.write().remove(key)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the map under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ValueMap<V>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` against the map under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut ValueMap<V>) -> R) -> R {
        f(&mut self.inner.write())
    }
}

impl<V: Clone> SharedValueMap<V> {
    /// Get a clone of the value for a key.
    pub fn get(&self, key: &Key) -> Result<Option<V>, SerializationError> {
        Ok(self.inner.read().get(key)?.cloned())
    }

    /// Snapshot of the original keys in insertion order.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.read().keys().cloned().collect()
    }

    /// Snapshot of `(original key, value)` pairs in insertion order.
    pub fn entries(&self) -> Vec<(Key, V)> {
        self.inner
            .read()
            .entries()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Call `f(value, key)` for a snapshot of every entry.
    ///
    /// Runs outside the lock, so `f` may use the map.
    pub fn for_each(&self, mut f: impl FnMut(&V, &Key, &Self)) {
        for (key, value) in self.entries() {
            f(&value, &key, self);
        }
    }
}

impl<V> Default for SharedValueMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> From<ValueMap<V>> for SharedValueMap<V> {
    fn from(map: ValueMap<V>) -> Self {
        Self::from_map(map)
    }
}
