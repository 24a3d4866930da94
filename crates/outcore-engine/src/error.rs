//! Engine error types

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the staging engine and its fetch callbacks
#[derive(Debug, Error)]
pub enum EngineError {
    /// Chunk geometry or store failure
    #[error(transparent)]
    Chunk(#[from] outcore_chunk::ChunkError),

    /// Memory subsystem failure
    #[error(transparent)]
    Mem(#[from] outcore_mem::MemError),

    /// A fetch callback failed for one block
    #[error("fetch failed for block {key}: {reason}")]
    Fetch {
        /// Block identity the fetch was for
        key: String,
        /// Backend-reported failure
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Fetch {
            key: "b0".into(),
            reason: "backend offline".into(),
        };
        assert!(err.to_string().contains("b0"));
        assert!(err.to_string().contains("backend offline"));
    }

    #[test]
    fn test_chunk_error_converts() {
        fn fails() -> EngineResult<()> {
            Err(outcore_chunk::ChunkError::EmptyShape(vec![]))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(EngineError::Chunk(_))));
    }
}
