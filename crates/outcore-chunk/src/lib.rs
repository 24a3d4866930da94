//! outcore-chunk: chunk geometry and tile tracking
//!
//! The shape arithmetic and bookkeeping that tie logical tensor tiles to a
//! chunked storage backend:
//!
//! - Alignment of tile shapes to the store's chunk granularity and
//!   byte-budget-driven chunk sizing
//! - A dense tile registry distinguishing virtual (all-zero) tiles from
//!   tiles present on disk or staged in memory
//! - The [`ChunkStore`] contract a storage backend implements, with an
//!   in-memory reference backend for tests and standalone runs

#![warn(missing_docs)]

pub mod align;
pub mod error;
pub mod registry;
pub mod store;

pub use align::{
    align_chunk_to_tile, chunk_dims_for_budget, physical_offset, BlockDescriptor, ELEMENT_BYTES,
};
pub use error::{ChunkError, ChunkResult};
pub use registry::{ScanReport, TileMetadata, TileRegistry, TileStatus};
pub use store::{ChunkStore, MemoryChunkStore};
