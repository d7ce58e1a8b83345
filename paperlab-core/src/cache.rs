//! Bounded in-memory cache with per-entry expiry.
//!
//! Backed by `lru::LruCache`, read with `peek` so lookups never promote an
//! entry: when full, the entry inserted longest ago is evicted.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Thread-safe TTL cache keyed by string.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Fresh value for `key`; an expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.peek(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                tracing::trace!(key = %key, "Cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
            tracing::trace!(key = %key, "Cache entry expired");
        }
        None
    }

    /// Insert or replace `key`. Expired entries are purged first; a full
    /// cache then drops its oldest entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::purge_expired(&mut entries, self.ttl);

        // Re-inserting counts as a new insertion for eviction order.
        entries.pop(&key);
        if let Some((evicted, _)) = entries.push(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        ) {
            tracing::debug!(key = %evicted, "Cache full; evicted oldest entry");
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(key)
            .map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, expired ones included until next purge.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut LruCache<String, Entry<V>>, ttl: Duration) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}
