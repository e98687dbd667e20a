//! Bounded LRU store for fetched responses.

use super::key::key_matches_endpoint;
use crate::transport::Payload;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A cached response and the moment it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Payload,
    pub timestamp: Instant,
}

impl CacheEntry {
    pub fn new(data: Payload) -> Self {
        Self {
            data,
            timestamp: Instant::now(),
        }
    }

    /// Fresh entries are younger than `ttl`; stale ones stay stored until evicted.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub deletes: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    deletes: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Least-recently-used request cache shared by every fetcher of a client.
///
/// - `get` promotes a hit to most-recently-used
/// - `set` evicts the least-recently-used entry when full; re-setting a key promotes it
/// - `has` only checks presence and leaves the order alone
pub struct RequestCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: NonZeroUsize,
    stats: AtomicStats,
}

impl RequestCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            stats: AtomicStats::default(),
        }
    }

    // a poisoned lock still guards a consistent map
    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let hit = self.lock().get(key).cloned();
        let counter = if hit.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    pub fn set(&self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        let displaced = self.lock().push(key.clone(), entry);
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        if let Some((old_key, _)) = displaced {
            if old_key != key {
                tracing::debug!(evicted = old_key.as_str(), "request cache full, evicted entry");
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let removed = self.lock().pop(key).is_some();
        if removed {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove every entry cached for `endpoint` or any resource nested under it.
    pub fn delete_by_endpoint(&self, endpoint: &str) -> usize {
        let mut entries = self.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(k, _)| key_matches_endpoint(k, endpoint))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        self.stats
            .deletes
            .fetch_add(doomed.len() as u64, Ordering::Relaxed);
        doomed.len()
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        self.stats
            .deletes
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Keys from most- to least-recently-used.
    pub fn keys(&self) -> Vec<String> {
        self.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}
