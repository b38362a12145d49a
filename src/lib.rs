//! # value-map
//!
//! An insertion-ordered map whose keys are compared by structural value.
//!
//! Two key objects holding the same data (same scalar, same array elements in
//! the same order, same object fields in any order) address the same entry.
//! Each key is reduced to a canonical [`Fingerprint`] that serves as the real
//! index, while a side [`KeyRegistry`] remembers the caller's original key so
//! iteration hands back keys with their original shape and type, date/time
//! instants included.
//!
//! ## Example
//!
//! ```rust
//! use value_map::{Key, ValueMap};
//! use serde_json::json;
//!
//! let mut map: ValueMap<u32> = ValueMap::new();
//! map.set(json!({"neat": "cool", "number": 100}), 1).unwrap();
//!
//! let same = Key::from(json!({"number": 100, "neat": "cool"}));
//! assert_eq!(map.get(&same).unwrap(), Some(&1));
//! assert_eq!(map.len(), 1);
//! ```

#![forbid(unsafe_code)]

pub mod canonical;
pub mod codec;
pub mod error;
pub mod key;
pub mod registry;
pub mod shared;

pub use canonical::{canonicalize, Canonicalizer, Fingerprint};
pub use codec::{BlobCodec, CodecRegistry, KeyCodec};
pub use error::{CodecError, RegisterError, ReviveError, SerializationError};
pub use key::{Blob, CustomKey, Key};
pub use registry::KeyRegistry;
pub use shared::SharedValueMap;

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use indexmap::IndexMap;

// =============================================================================
// Configuration
// =============================================================================

const DEFAULT_MAX_DEPTH: usize = 128;

/// Configuration for a [`ValueMap`] and its [`Canonicalizer`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Deepest array/object nesting a key may have.
    pub max_depth: usize,
    /// Number of entries to reserve up front.
    pub initial_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            initial_capacity: 0,
        }
    }
}

// =============================================================================
// ValueMap
// =============================================================================

/// An insertion-ordered map keyed by structural value.
///
/// Values live in an [`IndexMap`] indexed by fingerprint; original keys live
/// in a [`KeyRegistry`] under the same fingerprint. Every mutation updates
/// both, so a fingerprint is present in one exactly when it is present in the
/// other.
///
/// Every keyed operation can fail with [`SerializationError`] when the key is
/// outside the supported domain. A missing entry is `Ok(None)` / `Ok(false)`.
#[derive(Clone)]
pub struct ValueMap<V> {
    values: IndexMap<Fingerprint, V>,
    registry: KeyRegistry,
    canonicalizer: Arc<Canonicalizer>,
}

impl<V> ValueMap<V> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config {
            initial_capacity: capacity,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let canonicalizer = Arc::new(Canonicalizer::with_config(&config));
        Self::build(canonicalizer, config.initial_capacity)
    }

    /// Use a shared canonicalizer, typically one with extra codecs registered.
    pub fn with_canonicalizer(canonicalizer: Arc<Canonicalizer>) -> Self {
        Self::build(canonicalizer, 0)
    }

    fn build(canonicalizer: Arc<Canonicalizer>, capacity: usize) -> Self {
        Self {
            values: IndexMap::with_capacity(capacity),
            registry: KeyRegistry::with_capacity(capacity),
            canonicalizer,
        }
    }

    /// Build a map by applying `set` to each pair in order, so later
    /// duplicates win.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, SerializationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
    {
        let mut map = Self::new();
        map.extend_entries(entries)?;
        Ok(map)
    }

    /// Apply `set` to each pair in order. Stops at the first rejected key;
    /// pairs before it stay inserted.
    pub fn extend_entries<I, K>(&mut self, entries: I) -> Result<(), SerializationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
    {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn canonicalizer(&self) -> &Arc<Canonicalizer> {
        &self.canonicalizer
    }

    /// The fingerprint this map files `key` under.
    pub fn fingerprint(&self, key: &Key) -> Result<Fingerprint, SerializationError> {
        self.canonicalizer.canonicalize(key)
    }

    #[inline]
    fn debug_check_paired(&self) {
        debug_assert_eq!(
            self.values.len(),
            self.registry.len(),
            "value store and key registry must hold the same fingerprints"
        );
    }
}

impl<V> ValueMap<V> {
    pub fn get(&self, key: &Key) -> Result<Option<&V>, SerializationError> {
        let fingerprint = self.fingerprint(key)?;
        Ok(self.values.get(&fingerprint))
    }

    pub fn get_mut(&mut self, key: &Key) -> Result<Option<&mut V>, SerializationError> {
        let fingerprint = self.fingerprint(key)?;
        Ok(self.values.get_mut(&fingerprint))
    }

    /// The stored original key and its value.
    pub fn get_key_value(&self, key: &Key) -> Result<Option<(&Key, &V)>, SerializationError> {
        let fingerprint = self.fingerprint(key)?;
        Ok(self
            .values
            .get_key_value(&fingerprint)
            .map(|(fp, value)| (original_key(&self.registry, fp), value)))
    }

    pub fn has(&self, key: &Key) -> Result<bool, SerializationError> {
        let fingerprint = self.fingerprint(key)?;
        Ok(self.values.contains_key(&fingerprint))
    }

    /// Insert or overwrite, returning the previous value.
    ///
    /// On overwrite the entry keeps its position, and `key` replaces the
    /// previously stored original key.
    pub fn insert(&mut self, key: impl Into<Key>, value: V) -> Result<Option<V>, SerializationError> {
        let key = key.into();
        let fingerprint = self.fingerprint(&key)?;

        let old = self.values.insert(fingerprint.clone(), value);
        log::trace!(
            "{} {fingerprint}",
            if old.is_some() { "overwrite" } else { "insert" }
        );
        let old_key = self.registry.put(fingerprint, key);
        debug_assert_eq!(
            old.is_some(),
            old_key.is_some(),
            "key registry out of sync with value store"
        );
        self.debug_check_paired();
        Ok(old)
    }

    /// Insert or overwrite, returning the map for chaining.
    pub fn set(&mut self, key: impl Into<Key>, value: V) -> Result<&mut Self, SerializationError> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Remove an entry, returning the stored original key and value.
    ///
    /// The remaining entries keep their relative order.
    pub fn remove(&mut self, key: &Key) -> Result<Option<(Key, V)>, SerializationError> {
        let fingerprint = self.fingerprint(key)?;
        let Some(value) = self.values.shift_remove(&fingerprint) else {
            debug_assert!(
                !self.registry.contains(&fingerprint),
                "key registry out of sync with value store"
            );
            return Ok(None);
        };

        log::trace!("delete {fingerprint}");
        let original = self
            .registry
            .remove(&fingerprint)
            .expect("key registry out of sync with value store");
        self.debug_check_paired();
        Ok(Some((original, value)))
    }

    /// Remove an entry, returning whether it existed.
    pub fn delete(&mut self, key: &Key) -> Result<bool, SerializationError> {
        Ok(self.remove(key)?.is_some())
    }

    pub fn clear(&mut self) {
        log::debug!("clearing {} entries", self.values.len());
        self.values.clear();
        self.registry.clear();
    }

    /// Call `f(value, key, map)` for every entry in insertion order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&V, &Key, &Self),
    {
        for (key, value) in self.entries() {
            f(value, key, self);
        }
    }

    /// Original keys in insertion order.
    pub fn keys(&self) -> Keys<'_, V> {
        Keys {
            inner: self.entries(),
        }
    }

    /// `(original key, value)` pairs in insertion order.
    pub fn entries(&self) -> Entries<'_, V> {
        Entries {
            registry: &self.registry,
            inner: self.values.iter(),
        }
    }

    pub fn values(&self) -> Values<'_, V> {
        Values {
            inner: self.values.values(),
        }
    }
}

impl<V> Default for ValueMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for ValueMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl<'a, V> IntoIterator for &'a ValueMap<V> {
    type Item = (&'a Key, &'a V);
    type IntoIter = Entries<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

// =============================================================================
// Iterators
// =============================================================================

fn original_key<'a>(registry: &'a KeyRegistry, fingerprint: &Fingerprint) -> &'a Key {
    registry
        .get(fingerprint)
        .expect("key registry out of sync with value store")
}

pub struct Entries<'a, V> {
    registry: &'a KeyRegistry,
    inner: indexmap::map::Iter<'a, Fingerprint, V>,
}

impl<'a, V> Iterator for Entries<'a, V> {
    type Item = (&'a Key, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (fingerprint, value) = self.inner.next()?;
        Some((original_key(self.registry, fingerprint), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> DoubleEndedIterator for Entries<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (fingerprint, value) = self.inner.next_back()?;
        Some((original_key(self.registry, fingerprint), value))
    }
}

impl<V> ExactSizeIterator for Entries<'_, V> {}
impl<V> FusedIterator for Entries<'_, V> {}

impl<V> Clone for Entries<'_, V> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            inner: self.inner.clone(),
        }
    }
}

pub struct Keys<'a, V> {
    inner: Entries<'a, V>,
}

impl<'a, V> Iterator for Keys<'a, V> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> DoubleEndedIterator for Keys<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(key, _)| key)
    }
}

impl<V> ExactSizeIterator for Keys<'_, V> {}
impl<V> FusedIterator for Keys<'_, V> {}

impl<V> Clone for Keys<'_, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct Values<'a, V> {
    inner: indexmap::map::Values<'a, Fingerprint, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> DoubleEndedIterator for Values<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<V> ExactSizeIterator for Values<'_, V> {}
impl<V> FusedIterator for Values<'_, V> {}

impl<V> Clone for Values<'_, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}


#[cfg(test)]
mod proptests;
