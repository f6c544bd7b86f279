//! Bounded LRU entry store.
//!
//! Maps cache keys to shared entries. Capacity is counted in entries; the
//! least recently used entry is evicted when an insert overflows it.
//! `get_or_create_pending` refreshes recency, `peek` and `keys` do not.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::entry::Entry;

/// Thread-safe LRU map from key to entry.
pub struct EntryStore {
    inner: Mutex<LruCache<String, Arc<Entry>>>,
}

impl EntryStore {
    /// Create a store holding at most `max_entries` entries (at least one).
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get an entry without touching recency.
    pub fn peek(&self, key: &str) -> Option<Arc<Entry>> {
        self.inner.lock().peek(key).cloned()
    }

    /// Return the entry for `key`, creating a pending one if absent.
    ///
    /// The boolean is `true` only for the caller that created the entry;
    /// lookup and creation happen under one lock so exactly one caller wins.
    pub fn get_or_create_pending(&self, key: &str) -> (Arc<Entry>, bool, Option<String>) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.get(key) {
            return (entry.clone(), false, None);
        }
        let entry = Arc::new(Entry::pending());
        let evicted = inner
            .push(key.to_string(), entry.clone())
            .map(|(evicted, _)| evicted);
        if let Some(evicted) = &evicted {
            debug!("Evicted least recently used entry {}", evicted);
        }
        (entry, true, evicted)
    }

    /// Remove an entry.
    pub fn remove(&self, key: &str) -> Option<Arc<Entry>> {
        self.inner.lock().pop(key)
    }

    /// Remove `key` only while it still maps to `entry`.
    pub fn remove_if_same(&self, key: &str, entry: &Arc<Entry>) -> bool {
        let mut inner = self.inner.lock();
        let same = inner
            .peek(key)
            .map(|current| Arc::ptr_eq(current, entry))
            .unwrap_or(false);
        if same {
            inner.pop(key);
        }
        same
    }

    /// Snapshot of all keys, most recently used first. Recency is unchanged.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    /// Remove and return all entries.
    pub fn drain(&self) -> Vec<Arc<Entry>> {
        let mut inner = self.inner.lock();
        let entries = inner.iter().map(|(_, e)| e.clone()).collect();
        inner.clear();
        entries
    }
}
