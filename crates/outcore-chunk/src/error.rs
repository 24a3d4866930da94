//! Chunk geometry and store error types

use thiserror::Error;

/// Result type for chunk operations
pub type ChunkResult<T> = Result<T, ChunkError>;

/// Errors from chunk geometry, the tile registry, and chunk stores
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Tile shape and alignment rank differ
    #[error("rank mismatch: tile shape has rank {tile_rank}, alignment has rank {align_rank}")]
    RankMismatch {
        /// Rank of the tile shape
        tile_rank: usize,
        /// Rank of the alignment shape
        align_rank: usize,
    },

    /// A shape with no axes or a zero extent where one is required
    #[error("empty or degenerate shape: {0:?}")]
    EmptyShape(Vec<usize>),

    /// Buffer length does not match the shape volume
    #[error("shape mismatch: shape {shape:?} implies {expected} elements, buffer has {actual}")]
    ShapeMismatch {
        /// Requested chunk shape
        shape: Vec<usize>,
        /// Element count the shape implies
        expected: usize,
        /// Element count actually supplied
        actual: usize,
    },

    /// Chunk offset plus shape falls outside the store's global extent
    #[error("offset {offset:?} with shape {shape:?} exceeds global dims {global:?}")]
    OffsetOutOfBounds {
        /// Physical element offset of the chunk
        offset: Vec<usize>,
        /// Shape of the transfer
        shape: Vec<usize>,
        /// Global extent of the store
        global: Vec<usize>,
    },

    /// Tile array allocation failed
    #[error("failed to allocate tile registry for {tiles} tiles")]
    RegistryAlloc {
        /// Number of tiles the registry would track
        tiles: usize,
    },
}
