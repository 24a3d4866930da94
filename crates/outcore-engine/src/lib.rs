//! outcore-engine: out-of-core block staging
//!
//! Lets a tensor-contraction workload operate on arrays larger than main
//! memory by staging fixed-size blocks between a chunked store and a
//! bounded in-memory working set, overlapping I/O with compute.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      compute side                        │
//! │   register_block / queue_prefetch / lookup_cache         │
//! └───────┬──────────────────────────────────────▲───────────┘
//!         │                                      │
//! ┌───────▼──────────┐   ┌──────────────┐   ┌───┴──────────┐
//! │ MetadataRegistry │   │   IoThread   │   │   LruCache   │
//! │  (skip is_zero)  │──▶│ fetch worker │──▶│ byte budget  │
//! └──────────────────┘   └──────┬───────┘   └──────────────┘
//!                               │        try_consume / wait_consume
//!                        ┌──────▼───────┐
//!                        │  ChunkStore  │
//!                        │  (backend)   │
//!                        └──────────────┘
//! ```
//!
//! All-zero blocks are never fetched: they are skipped at prefetch time and
//! synthesized as zeros by the compute side on demand. Failed fetches are
//! isolated to their block and counted, never retried here.

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod io_thread;
pub mod metadata;

pub use config::EngineConfig;
pub use engine::{EngineStats, OutcoreEngine};
pub use error::{EngineError, EngineResult};
pub use io_thread::{FetchFn, IoStats, IoThread, PrefetchRequest};
pub use metadata::{BlockMetadata, MetadataRegistry};

// The chunk-geometry surface the compute side needs alongside the engine.
pub use outcore_chunk::{align_chunk_to_tile, BlockDescriptor};
pub use outcore_mem::{CacheEntry, CacheStats};
