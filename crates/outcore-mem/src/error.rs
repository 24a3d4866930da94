//! Memory subsystem error types

use thiserror::Error;

/// Result type for memory operations
pub type MemResult<T> = Result<T, MemError>;

/// Errors from the buffer pool and related memory primitives
#[derive(Debug, Error)]
pub enum MemError {
    /// No free pages remain; the caller decides whether to wait or evict
    #[error("buffer pool exhausted: all {pages} pages acquired")]
    Exhausted {
        /// Total pages in the pool
        pages: usize,
    },

    /// Page id outside the pool's range
    #[error("invalid page id {id} (pool has {pages} pages)")]
    InvalidPage {
        /// Offending page id
        id: u32,
        /// Total pages in the pool
        pages: usize,
    },

    /// Release when every page is already free
    #[error("double release of page {id}: free list is already full")]
    DoubleRelease {
        /// Offending page id
        id: u32,
    },

    /// Backing allocation failed
    #[error("failed to allocate pool backing store of {elements} samples")]
    AllocFailed {
        /// Requested element count
        elements: usize,
    },
}
