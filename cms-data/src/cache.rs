use crate::error::Result;
use crate::loader::{DataLoader, DataLoaderOptions};
use cms_model::{DataAdapter, MixedCollection};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One loader per key, created on first request and reused afterwards.
///
/// Keys identify a data scope (a page, a context occurrence, the root
/// slots), so re-rendering the same scope keeps its already-loaded data.
pub struct DataLoaderCache<K> {
    loaders: Mutex<HashMap<K, Arc<DataLoader>>>,
}

impl<K: Hash + Eq> DataLoaderCache<K> {
    pub fn new() -> Self {
        Self {
            loaders: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<DataLoader>>> {
        self.loaders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `adapter_types` and `options` only matter the first time `key` is seen.
    pub fn get_or_create<I, S>(
        &self,
        key: K,
        adapter_types: I,
        adapters: &MixedCollection<Arc<dyn DataAdapter>>,
        options: DataLoaderOptions,
    ) -> Result<Arc<DataLoader>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut loaders = self.lock();
        if let Some(loader) = loaders.get(&key) {
            return Ok(Arc::clone(loader));
        }
        let loader = Arc::new(DataLoader::new(adapter_types, adapters, options)?);
        loaders.insert(key, Arc::clone(&loader));
        Ok(loader)
    }

    pub fn get(&self, key: &K) -> Option<Arc<DataLoader>> {
        self.lock().get(key).cloned()
    }

    /// Removes and disposes the loader for `key`.
    pub fn evict(&self, key: &K) -> bool {
        let loader = self.lock().remove(key);
        match loader {
            Some(loader) => {
                loader.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Disposes every cached loader and empties the cache.
    pub fn dispose_all(&self) {
        let loaders: Vec<_> = self.lock().drain().map(|(_, l)| l).collect();
        for loader in loaders {
            loader.dispose();
        }
    }
}

impl<K: Hash + Eq> Default for DataLoaderCache<K> {
    fn default() -> Self {
        Self::new()
    }
}
