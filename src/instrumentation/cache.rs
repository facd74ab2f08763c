//! Name-keyed instrument cache.
//!
//! The check and the insert happen under one lock, so two callers racing
//! on the same missing name still create exactly one instrument.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lookup-or-create map with first-writer-wins semantics.
///
/// Used with `String` keys for instruments and with `(component, version)`
/// keys for whole facades.
#[derive(Debug)]
pub struct InstrumentCache<K, T: ?Sized> {
    entries: Mutex<HashMap<K, Arc<T>>>,
}

impl<K, T: ?Sized> Default for InstrumentCache<K, T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, T: ?Sized> InstrumentCache<K, T> {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached entry for `key`, creating it with `create` on a miss.
    ///
    /// `create` runs while the cache is locked and at most once per key.
    pub fn get_or_create<F>(&self, key: K, create: F) -> Arc<T>
    where
        F: FnOnce() -> Arc<T>,
    {
        let mut entries = self.lock();
        Arc::clone(entries.entry(key).or_insert_with(create))
    }

    /// Fallible variant of [`get_or_create`](Self::get_or_create).
    ///
    /// Nothing is inserted when `create` fails.
    pub fn try_get_or_create<F, E>(&self, key: K, create: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let created = create()?;
        entries.insert(key, Arc::clone(&created));
        Ok(created)
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic inside `create` leaves the map itself consistent, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
