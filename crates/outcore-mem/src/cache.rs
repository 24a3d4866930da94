//! Byte-budgeted LRU cache for staged block data

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One cached block: its identity and materialized samples
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Block identity
    pub key: String,
    /// Materialized samples
    pub data: Vec<f64>,
}

impl CacheEntry {
    /// Payload size in bytes
    pub fn bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f64>()
    }
}

/// Cache counters, snapshotted under the cache lock
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
    /// Entries evicted to stay under budget
    pub evictions: u64,
    /// Entries currently resident
    pub entries: usize,
    /// Bytes currently resident
    pub cached_bytes: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheInner {
    entries: HashMap<String, Arc<CacheEntry>>,
    // Most recent at the front; O(n) promotion is fine at tile-count scales.
    recency: VecDeque<String>,
    current_bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_front(key.to_string());
    }
}

/// LRU cache mapping block identity to materialized data
///
/// Insertion enforces the byte budget synchronously: after every insert the
/// least-recently-used entries are dropped until the running total fits.
/// Lookups promote and hand out `Arc` clones, so readers never copy
/// payloads and eviction never invalidates a handed-out entry.
pub struct LruCache {
    max_bytes: usize,
    inner: Mutex<CacheInner>,
}

impl LruCache {
    /// Create a cache bounded to `max_bytes` of payload
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: VecDeque::new(),
                current_bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up a block, promoting it to most-recently-used on a hit
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(entry) => {
                inner.touch(key);
                inner.hits += 1;
                Some(entry)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace a block, then evict until the budget holds
    ///
    /// Returns the keys evicted by this call, oldest first. The returned
    /// list can include `key` itself when the new entry alone exceeds the
    /// whole budget; the caller sees that as its "reduce footprint" signal
    /// rather than a hard error.
    pub fn insert(&self, key: &str, data: Vec<f64>) -> Vec<String> {
        let entry = Arc::new(CacheEntry {
            key: key.to_string(),
            data,
        });
        let bytes = entry.bytes();

        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.insert(key.to_string(), entry) {
            inner.current_bytes -= old.bytes();
        }
        inner.current_bytes += bytes;
        inner.touch(key);

        let mut evicted = Vec::new();
        while inner.current_bytes > self.max_bytes {
            let Some(victim) = inner.recency.pop_back() else {
                break;
            };
            if let Some(old) = inner.entries.remove(&victim) {
                inner.current_bytes -= old.bytes();
                inner.evictions += 1;
            }
            debug!(key = %victim, "evicted from cache");
            evicted.push(victim);
        }

        if evicted.iter().any(|k| k == key) {
            warn!(
                %key,
                bytes,
                budget = self.max_bytes,
                "entry exceeds entire cache budget and was evicted on insert"
            );
        }
        evicted
    }

    /// Bytes currently resident
    pub fn current_bytes(&self) -> usize {
        self.inner.lock().current_bytes
    }

    /// Byte budget
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Snapshot the counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
            cached_bytes: inner.current_bytes,
        }
    }
}
