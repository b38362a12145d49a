//! Side table from fingerprint to the original key.
//!
//! Keys handed back by iteration come from here rather than from re-parsing
//! the fingerprint, so they keep their exact types and field order.

use std::collections::HashMap;

use crate::canonical::Fingerprint;
use crate::key::Key;

/// Original keys indexed by fingerprint.
///
/// Only [`ValueMap`](crate::ValueMap) mutates a registry, always together with
/// its value store.
#[derive(Clone, Debug, Default)]
pub struct KeyRegistry {
    keys: HashMap<Fingerprint, Key>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashMap::with_capacity(capacity),
        }
    }

    /// Record `key` for `fingerprint`, replacing any earlier key.
    pub(crate) fn put(&mut self, fingerprint: Fingerprint, key: Key) -> Option<Key> {
        self.keys.insert(fingerprint, key)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Key> {
        self.keys.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.keys.contains_key(fingerprint)
    }

    pub(crate) fn remove(&mut self, fingerprint: &Fingerprint) -> Option<Key> {
        self.keys.remove(fingerprint)
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
