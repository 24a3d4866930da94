//! Staging engine orchestration
//!
//! Ties the catalog, the fetch worker, the cache, and the staging buffer
//! together: callers register block metadata, queue prefetches by key, and
//! drain completed fetches into the cache while the worker keeps reading
//! ahead.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use outcore_mem::{CacheEntry, CacheStats, DoubleBuffer, LruCache};

use crate::config::EngineConfig;
use crate::io_thread::{FetchFn, IoStats, IoThread, PrefetchRequest};
use crate::metadata::{BlockMetadata, MetadataRegistry};

/// Combined engine counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Cache counters
    pub cache: CacheStats,
    /// Fetch worker counters
    pub io: IoStats,
}

/// Out-of-core block staging engine
///
/// One engine owns one cache, one staging buffer, and one background fetch
/// worker, so several independent engines can coexist in a process. All
/// methods take `&self` and are safe to call from any thread.
pub struct OutcoreEngine {
    metadata: MetadataRegistry,
    cache: LruCache,
    staging: Mutex<DoubleBuffer>,
    io: IoThread,
}

impl OutcoreEngine {
    /// Create an engine with the built-in synthesizing fetch
    ///
    /// The built-in fetch produces zeroed buffers sized by the request's
    /// chunk volume. Useful for tests and for dry-running access patterns;
    /// production callers wire a real backend via
    /// [`with_fetch`](Self::with_fetch).
    pub fn new(config: EngineConfig) -> Self {
        let fetch: FetchFn =
            Arc::new(|request: &PrefetchRequest| Ok(vec![0.0; request.descriptor.chunk_elements()]));
        Self::with_fetch(config, fetch)
    }

    /// Create an engine whose worker runs the given fetch callback
    pub fn with_fetch(config: EngineConfig, fetch: FetchFn) -> Self {
        Self {
            metadata: MetadataRegistry::new(),
            cache: LruCache::new(config.cache_bytes),
            staging: Mutex::new(DoubleBuffer::new(config.staging_bytes)),
            io: IoThread::spawn(fetch),
        }
    }

    /// Register or replace a block's metadata
    pub fn register_block(&self, key: &str, metadata: BlockMetadata) {
        self.metadata.register(key, metadata);
    }

    /// Queue a prefetch for a registered block
    ///
    /// Unknown keys and all-zero blocks are a no-op: a virtual block is
    /// synthesized as zeros by the compute side on demand, never pulled
    /// through I/O.
    pub fn queue_prefetch(&self, key: &str) {
        let Some(meta) = self.metadata.lookup(key) else {
            debug!(%key, "prefetch for unregistered block ignored");
            return;
        };
        if meta.is_zero {
            debug!(%key, "skipping prefetch of all-zero block");
            return;
        }
        self.io.enqueue(PrefetchRequest {
            key: key.to_string(),
            descriptor: meta.descriptor,
        });
    }

    /// Drain one completed fetch into the cache, without blocking
    ///
    /// On success the entry is cached under its key and the staging buffer
    /// roles are swapped; returns whether anything was consumed. A `false`
    /// return changes no state.
    pub fn try_consume(&self) -> bool {
        match self.io.pop_ready() {
            Some(entry) => {
                self.consume(entry);
                true
            }
            None => false,
        }
    }

    /// Like [`try_consume`](Self::try_consume), waiting up to `timeout`
    pub fn wait_consume(&self, timeout: Duration) -> bool {
        match self.io.wait_ready(timeout) {
            Some(entry) => {
                self.consume(entry);
                true
            }
            None => false,
        }
    }

    fn consume(&self, entry: CacheEntry) {
        debug!(key = %entry.key, samples = entry.data.len(), "consuming fetched block");
        self.cache.insert(&entry.key, entry.data);
        self.staging.lock().swap();
    }

    /// Look up a block in the cache, promoting it on a hit
    pub fn lookup_cache(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.cache.get(key)
    }

    /// Bytes currently held by the cache
    pub fn cache_bytes(&self) -> usize {
        self.cache.current_bytes()
    }

    /// Fetches queued but not yet picked up by the worker
    pub fn pending_fetches(&self) -> usize {
        self.io.pending()
    }

    /// Registered block identities
    pub fn block_keys(&self) -> Vec<String> {
        self.metadata.keys()
    }

    /// Access the staging buffer
    ///
    /// The lock is held for the guard's lifetime; a consume call swaps the
    /// roles, so do not cache role assignments across calls.
    pub fn staging(&self) -> MutexGuard<'_, DoubleBuffer> {
        self.staging.lock()
    }

    /// Snapshot all counters
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            cache: self.cache.stats(),
            io: self.io.stats(),
        }
    }

    /// Stop the fetch worker
    ///
    /// Idempotent; returns after the worker has exited. Cached data remains
    /// readable, but no further fetches complete.
    pub fn stop(&self) {
        self.io.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outcore_chunk::align_chunk_to_tile;

    fn block(is_zero: bool) -> BlockMetadata {
        BlockMetadata {
            is_zero,
            storage_path: "/tensor/block0".to_string(),
            descriptor: align_chunk_to_tile(&[4, 4], &[2, 2], 4).unwrap(),
        }
    }

    fn small_engine() -> OutcoreEngine {
        OutcoreEngine::new(EngineConfig::with_cache_bytes(1024))
    }

    #[test]
    fn test_prefetch_and_consume() {
        let engine = small_engine();
        engine.register_block("b0", block(false));
        engine.queue_prefetch("b0");

        assert!(engine.wait_consume(Duration::from_millis(250)));
        let entry = engine.lookup_cache("b0").expect("cached after consume");
        assert_eq!(entry.data.len(), 4 * 4);
        assert!(engine.cache_bytes() > 0);
    }

    #[test]
    fn test_zero_block_never_fetched() {
        let engine = small_engine();
        engine.register_block("zero", block(true));

        let before = engine.pending_fetches();
        engine.queue_prefetch("zero");
        assert_eq!(engine.pending_fetches(), before);

        assert!(!engine.wait_consume(Duration::from_millis(50)));
        assert!(engine.lookup_cache("zero").is_none());
        assert_eq!(engine.stats().io.fetched, 0);
    }

    #[test]
    fn test_unregistered_key_is_noop() {
        let engine = small_engine();
        engine.queue_prefetch("nobody");
        assert_eq!(engine.pending_fetches(), 0);
        assert!(!engine.try_consume());
    }

    #[test]
    fn test_try_consume_false_changes_nothing() {
        let engine = small_engine();
        assert!(!engine.try_consume());
        assert_eq!(engine.cache_bytes(), 0);
        assert_eq!(engine.stats().cache.entries, 0);
    }

    #[test]
    fn test_consume_swaps_staging() {
        let engine = small_engine();
        engine.staging().write_buffer().fill(5.0);

        engine.register_block("b0", block(false));
        engine.queue_prefetch("b0");
        assert!(engine.wait_consume(Duration::from_millis(250)));

        // The filled side is now in the read role
        assert!(engine.staging().read_buffer().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_reregister_replaces_block() {
        let engine = small_engine();
        engine.register_block("b0", block(false));
        engine.register_block("b0", block(true));

        engine.queue_prefetch("b0");
        assert!(!engine.wait_consume(Duration::from_millis(50)));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let engine = small_engine();
        engine.register_block("b0", block(false));
        engine.queue_prefetch("b0");
        let _ = engine.wait_consume(Duration::from_millis(250));

        engine.stop();
        engine.stop();

        // Cached data is still readable after the worker is gone
        assert!(engine.lookup_cache("b0").is_some());
        engine.queue_prefetch("b0");
        assert_eq!(engine.pending_fetches(), 0);
    }

    #[test]
    fn test_staging_sized_from_config() {
        let engine = OutcoreEngine::new(EngineConfig::with_cache_bytes(1024));
        assert_eq!(engine.staging().len(), 512 / 8);
    }
}
