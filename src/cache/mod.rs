//! Thread-safe key/value cache
//!
//! Reads go straight to a sharded `DashMap`, so a reader only ever contends
//! with writers on the same shard. Mutations additionally serialize on one
//! writer lock, keeping `put`/`remove`/`clear` mutually exclusive.

use crate::errors::InvalidKey;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Keys decide for themselves whether they are usable.
///
/// The empty string and `None` play the role of a null key and are rejected.
pub trait CacheKey {
    fn is_valid_key(&self) -> bool;
}

impl CacheKey for str {
    fn is_valid_key(&self) -> bool {
        !self.is_empty()
    }
}

impl CacheKey for String {
    fn is_valid_key(&self) -> bool {
        !self.is_empty()
    }
}

impl<K: CacheKey> CacheKey for Option<K> {
    fn is_valid_key(&self) -> bool {
        self.as_ref().map_or(false, |k| k.is_valid_key())
    }
}

impl<K: CacheKey + ?Sized> CacheKey for &K {
    fn is_valid_key(&self) -> bool {
        (**self).is_valid_key()
    }
}

macro_rules! always_valid_key {
    ($($t:ty),*) => {
        $(impl CacheKey for $t {
            fn is_valid_key(&self) -> bool { true }
        })*
    };
}

always_valid_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool);

/// Counters describing cache traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removals: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removals: AtomicU64,
}

pub struct ThreadSafeCache<K, V>
where
    K: Eq + Hash,
{
    store: DashMap<K, V>,
    write_lock: Mutex<()>,
    counters: Counters,
}

impl<K, V> ThreadSafeCache<K, V>
where
    K: Eq + Hash + CacheKey + std::fmt::Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
            write_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Insert or replace. Returns the value previously stored under `key`.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, InvalidKey> {
        if !key.is_valid_key() {
            warn!("Attempted to put invalid key into cache");
            return Err(InvalidKey::new("put"));
        }

        let _guard = self.write_lock.lock();
        debug!(key = ?key, "Putting into cache");
        let previous = self.store.insert(key, value);

        if previous.is_some() {
            self.counters.updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(previous)
    }

    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>, InvalidKey>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + CacheKey + std::fmt::Debug + ?Sized,
    {
        if !key.is_valid_key() {
            warn!("Attempted to get value with invalid key from cache");
            return Err(InvalidKey::new("get"));
        }

        let value = self.store.get(key).map(|entry| entry.value().clone());
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = ?key, "Cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = ?key, "Cache miss");
        }
        Ok(value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> Result<bool, InvalidKey>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + CacheKey + ?Sized,
    {
        if !key.is_valid_key() {
            warn!("Attempted membership check with invalid key");
            return Err(InvalidKey::new("contains_key"));
        }
        Ok(self.store.contains_key(key))
    }

    /// Remove the mapping for `key`, returning the previous value if present
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>, InvalidKey>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + CacheKey + std::fmt::Debug + ?Sized,
    {
        if !key.is_valid_key() {
            warn!("Attempted to remove entry with invalid key from cache");
            return Err(InvalidKey::new("remove"));
        }

        let _guard = self.write_lock.lock();
        let removed = self.store.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.counters.removals.fetch_add(1, Ordering::Relaxed);
            debug!(key = ?key, "Removed cache entry");
        } else {
            debug!(key = ?key, "Attempted to remove non-existent key");
        }
        Ok(removed)
    }

    /// Snapshot of the entry count; may race with concurrent writers
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let _guard = self.write_lock.lock();
        let previous = self.store.len();
        self.store.clear();
        info!(previous_size = previous, "Cache cleared");
        previous
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            removals: self.counters.removals.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for ThreadSafeCache<K, V>
where
    K: Eq + Hash + CacheKey + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
