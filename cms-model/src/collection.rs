use crate::ModelError;
use std::collections::HashMap;
use std::fmt;

/// A string-keyed registry that remembers first-insertion order.
///
/// Re-adding an existing key replaces the value in place, so merging two
/// collections is last-write-wins without reordering.
#[derive(Clone)]
pub struct MixedCollection<V> {
    order: Vec<String>,
    items: HashMap<String, V>,
}

impl<V> MixedCollection<V> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }

    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        if !self.items.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.items.insert(key, value);
    }

    /// Returns the value under `key`, failing with [`ModelError::UnknownKey`].
    pub fn get(&self, key: &str) -> Result<&V, ModelError> {
        self.items
            .get(key)
            .ok_or_else(|| ModelError::UnknownKey(key.to_string()))
    }

    pub fn try_get(&self, key: &str) -> Option<&V> {
        self.items.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.items.get(k))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &V)> {
        self.order
            .iter()
            .filter_map(|k| self.items.get(k).map(|v| (k.as_str(), v)))
    }

    /// Copies every entry of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: &Self) -> &mut Self
    where
        V: Clone,
    {
        for (k, v) in other.entries() {
            self.add(k, v.clone());
        }
        self
    }
}

impl<V> Default for MixedCollection<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MixedCollection<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixedCollection")
            .field("keys", &self.order)
            .finish()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MixedCollection<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (k, v) in iter {
            collection.add(k, v);
        }
        collection
    }
}
