//! Chunk store contract and the in-memory reference backend

use dashmap::DashMap;
use tracing::debug;

use crate::error::{ChunkError, ChunkResult};

/// Block-granular storage backend consumed by the staging core
///
/// Implementations transfer whole chunks at a physical element offset.
/// Transfers are bit-exact: a failure is reported through the result, never
/// as a silently partial buffer. `allocated_chunks` exists solely so the
/// tile registry can reconcile against what is physically present without
/// walking the full logical space.
pub trait ChunkStore: Send + Sync {
    /// Read one chunk of samples at `offset` with the given shape
    fn read_chunk(&self, offset: &[usize], shape: &[usize]) -> ChunkResult<Vec<f64>>;

    /// Write one chunk of samples at `offset` with the given shape
    fn write_chunk(&self, offset: &[usize], shape: &[usize], data: &[f64]) -> ChunkResult<()>;

    /// Physical element offsets of every chunk that has actually been written
    fn allocated_chunks(&self) -> ChunkResult<Vec<Vec<usize>>>;
}

/// In-memory chunk store with zero fill and on-demand allocation
///
/// A chunk that has never been written occupies no memory and reads back as
/// zeros, which is exactly the sparsity contract the tile registry's `Null`
/// status relies on. Chunks are keyed by their physical offset.
#[derive(Debug)]
pub struct MemoryChunkStore {
    global_dims: Vec<usize>,
    chunk_dims: Vec<usize>,
    chunks: DashMap<Vec<usize>, Vec<f64>>,
}

impl MemoryChunkStore {
    /// Create an empty store covering `global_dims`, chunked by `chunk_dims`
    pub fn new(global_dims: Vec<usize>, chunk_dims: Vec<usize>) -> ChunkResult<Self> {
        if global_dims.is_empty() || global_dims.contains(&0) {
            return Err(ChunkError::EmptyShape(global_dims));
        }
        if chunk_dims.len() != global_dims.len() {
            return Err(ChunkError::RankMismatch {
                tile_rank: global_dims.len(),
                align_rank: chunk_dims.len(),
            });
        }
        debug!(?global_dims, ?chunk_dims, "memory chunk store created");
        Ok(Self {
            global_dims,
            chunk_dims,
            chunks: DashMap::new(),
        })
    }

    /// Global extent of the store
    pub fn global_dims(&self) -> &[usize] {
        &self.global_dims
    }

    /// Chunk granularity the store was provisioned with
    pub fn chunk_dims(&self) -> &[usize] {
        &self.chunk_dims
    }

    /// Number of chunks physically allocated
    pub fn allocated_count(&self) -> usize {
        self.chunks.len()
    }

    fn check_transfer(&self, offset: &[usize], shape: &[usize]) -> ChunkResult<()> {
        if offset.len() != self.global_dims.len() || shape.len() != self.global_dims.len() {
            return Err(ChunkError::RankMismatch {
                tile_rank: self.global_dims.len(),
                align_rank: offset.len().max(shape.len()),
            });
        }
        let in_bounds = offset
            .iter()
            .zip(shape)
            .zip(&self.global_dims)
            .all(|((&off, &extent), &global)| off + extent <= global);
        if !in_bounds {
            return Err(ChunkError::OffsetOutOfBounds {
                offset: offset.to_vec(),
                shape: shape.to_vec(),
                global: self.global_dims.clone(),
            });
        }
        Ok(())
    }
}

impl ChunkStore for MemoryChunkStore {
    fn read_chunk(&self, offset: &[usize], shape: &[usize]) -> ChunkResult<Vec<f64>> {
        self.check_transfer(offset, shape)?;
        let elements: usize = shape.iter().product();

        match self.chunks.get(offset) {
            Some(chunk) => {
                if chunk.len() != elements {
                    return Err(ChunkError::ShapeMismatch {
                        shape: shape.to_vec(),
                        expected: elements,
                        actual: chunk.len(),
                    });
                }
                Ok(chunk.clone())
            }
            // Never written: logically present, physically absent, all zero.
            None => Ok(vec![0.0; elements]),
        }
    }

    fn write_chunk(&self, offset: &[usize], shape: &[usize], data: &[f64]) -> ChunkResult<()> {
        self.check_transfer(offset, shape)?;
        let elements: usize = shape.iter().product();
        if data.len() != elements {
            return Err(ChunkError::ShapeMismatch {
                shape: shape.to_vec(),
                expected: elements,
                actual: data.len(),
            });
        }
        self.chunks.insert(offset.to_vec(), data.to_vec());
        Ok(())
    }

    fn allocated_chunks(&self) -> ChunkResult<Vec<Vec<usize>>> {
        let mut offsets: Vec<Vec<usize>> =
            self.chunks.iter().map(|entry| entry.key().clone()).collect();
        offsets.sort();
        Ok(offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> MemoryChunkStore {
        MemoryChunkStore::new(vec![8, 8], vec![4, 4]).unwrap()
    }

    #[test]
    fn test_unwritten_chunk_reads_zero() {
        let store = test_store();
        let data = store.read_chunk(&[0, 0], &[4, 4]).unwrap();
        assert_eq!(data, vec![0.0; 16]);
        assert_eq!(store.allocated_count(), 0);
    }

    #[test]
    fn test_write_read_roundtrip() {
        let store = test_store();
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        store.write_chunk(&[4, 0], &[4, 4], &data).unwrap();

        let back = store.read_chunk(&[4, 0], &[4, 4]).unwrap();
        assert_eq!(back, data);
        assert_eq!(store.allocated_count(), 1);
    }

    #[test]
    fn test_allocated_chunks_lists_written_offsets() {
        let store = test_store();
        store.write_chunk(&[4, 4], &[4, 4], &[1.0; 16]).unwrap();
        store.write_chunk(&[0, 0], &[4, 4], &[2.0; 16]).unwrap();

        let offsets = store.allocated_chunks().unwrap();
        assert_eq!(offsets, vec![vec![0, 0], vec![4, 4]]);
    }

    #[test]
    fn test_out_of_bounds_transfer_rejected() {
        let store = test_store();
        let err = store.read_chunk(&[8, 0], &[4, 4]).unwrap_err();
        assert!(matches!(err, ChunkError::OffsetOutOfBounds { .. }));

        let err = store.write_chunk(&[4, 8], &[4, 4], &[0.0; 16]).unwrap_err();
        assert!(matches!(err, ChunkError::OffsetOutOfBounds { .. }));
    }

    #[test]
    fn test_shape_data_mismatch_rejected() {
        let store = test_store();
        let err = store.write_chunk(&[0, 0], &[4, 4], &[0.0; 15]).unwrap_err();
        assert!(matches!(
            err,
            ChunkError::ShapeMismatch {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn test_rank_mismatch_rejected() {
        let err = MemoryChunkStore::new(vec![8, 8], vec![4]).unwrap_err();
        assert!(matches!(err, ChunkError::RankMismatch { .. }));

        let store = test_store();
        let err = store.read_chunk(&[0], &[4]).unwrap_err();
        assert!(matches!(err, ChunkError::RankMismatch { .. }));
    }
}
