//! Dense tile registry over a chunked tensor
//!
//! Tracks every logical tile of a tensor in one flat row-major array, even
//! tiles that have never been written. A tile's status distinguishes "never
//! materialized, implicitly zero" from "present on disk" from "staged in
//! memory", so the engine can skip I/O for virtual tiles entirely.

use tracing::{debug, error, info};

use crate::align::{chunk_dims_for_budget, physical_offset};
use crate::error::{ChunkError, ChunkResult};
use crate::store::ChunkStore;

/// Materialization state of one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileStatus {
    /// Never written; treated as all-zero without any I/O
    #[default]
    Null,
    /// Backing chunk exists in the store
    OnDisk,
    /// Staged in a memory pool page
    InRam,
}

/// Per-tile bookkeeping in the dense grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMetadata {
    /// Logical coordinates within the tile grid
    pub coords: Vec<usize>,
    /// Element offset of the tile's chunk along each axis
    pub physical_offset: Vec<usize>,
    /// Materialization state
    pub status: TileStatus,
    /// Pool page holding the tile while staged, if any
    pub buffer_id: Option<u32>,
}

impl TileMetadata {
    /// Mark the tile as present in the backing store
    pub fn mark_on_disk(&mut self) {
        self.status = TileStatus::OnDisk;
        self.buffer_id = None;
    }

    /// Mark the tile as staged in the given pool page
    pub fn mark_in_ram(&mut self, buffer_id: u32) {
        self.status = TileStatus::InRam;
        self.buffer_id = Some(buffer_id);
    }

    /// Drop the staged page, leaving the on-disk copy authoritative
    pub fn release_to_disk(&mut self) {
        self.status = TileStatus::OnDisk;
        self.buffer_id = None;
    }

    /// Whether the tile is implicit zero (no chunk exists anywhere)
    pub fn is_virtual(&self) -> bool {
        self.status == TileStatus::Null
    }
}

/// Outcome of reconciling the registry against a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Offsets that mapped onto a tile and were marked on-disk
    pub reconciled: usize,
    /// Offsets outside the registry's grid (store/registry disagreement)
    pub rejected: usize,
}

/// Dense flat registry of every tile in a tensor's grid
pub struct TileRegistry {
    global_dims: Vec<usize>,
    chunk_dims: Vec<usize>,
    grid_dims: Vec<usize>,
    total_tiles: usize,
    tiles: Vec<TileMetadata>,
}

impl TileRegistry {
    /// Build the registry for a tensor, sizing chunks to a byte budget
    ///
    /// Chunk dimensions come from [`chunk_dims_for_budget`]; the grid is the
    /// ceiling division of the global extent by the chunk extent, and one
    /// [`TileMetadata`] slot is allocated per grid cell with its physical
    /// offset precomputed.
    ///
    /// # Errors
    ///
    /// [`ChunkError::EmptyShape`] for a rank-0 shape or a zero extent,
    /// [`ChunkError::RegistryAlloc`] if the tile array cannot be allocated.
    pub fn new(global_dims: &[usize], target_chunk_bytes: usize) -> ChunkResult<Self> {
        if global_dims.is_empty() || global_dims.contains(&0) {
            return Err(ChunkError::EmptyShape(global_dims.to_vec()));
        }

        let chunk_dims = chunk_dims_for_budget(target_chunk_bytes, global_dims);
        let grid_dims: Vec<usize> = global_dims
            .iter()
            .zip(&chunk_dims)
            .map(|(&global, &chunk)| global.div_ceil(chunk))
            .collect();
        let total_tiles: usize = grid_dims.iter().product();

        let mut tiles = Vec::new();
        tiles
            .try_reserve_exact(total_tiles)
            .map_err(|_| ChunkError::RegistryAlloc { tiles: total_tiles })?;

        for index in 0..total_tiles {
            let coords = delinearize(index, &grid_dims);
            tiles.push(TileMetadata {
                physical_offset: physical_offset(&coords, &chunk_dims),
                coords,
                status: TileStatus::Null,
                buffer_id: None,
            });
        }

        debug!(
            ?global_dims,
            ?chunk_dims,
            ?grid_dims,
            total_tiles,
            "tile registry created"
        );

        Ok(Self {
            global_dims: global_dims.to_vec(),
            chunk_dims,
            grid_dims,
            total_tiles,
            tiles,
        })
    }

    /// Global extent of the tracked tensor
    pub fn global_dims(&self) -> &[usize] {
        &self.global_dims
    }

    /// Chunk extent per axis
    pub fn chunk_dims(&self) -> &[usize] {
        &self.chunk_dims
    }

    /// Number of tiles along each axis
    pub fn grid_dims(&self) -> &[usize] {
        &self.grid_dims
    }

    /// Total number of tiles tracked (dense, including virtual tiles)
    pub fn total_tiles(&self) -> usize {
        self.total_tiles
    }

    /// Look up a tile by grid coordinates
    ///
    /// Out-of-range coordinates return `None` rather than wrapping into a
    /// neighboring tile.
    pub fn tile(&self, coords: &[usize]) -> Option<&TileMetadata> {
        self.linear_index(coords).map(|index| &self.tiles[index])
    }

    /// Mutable tile lookup, same bounds rules as [`tile`](Self::tile)
    pub fn tile_mut(&mut self, coords: &[usize]) -> Option<&mut TileMetadata> {
        self.linear_index(coords)
            .map(move |index| &mut self.tiles[index])
    }

    /// Iterate all tiles in row-major order
    pub fn tiles(&self) -> impl Iterator<Item = &TileMetadata> {
        self.tiles.iter()
    }

    /// Number of tiles currently in the given status
    pub fn count_status(&self, status: TileStatus) -> usize {
        self.tiles.iter().filter(|t| t.status == status).count()
    }

    /// Reconcile tile statuses against the store's allocated chunks
    ///
    /// Every physical offset the store reports is converted to tile
    /// coordinates by per-axis integer division and marked `OnDisk`. An
    /// offset that maps outside the grid means the store and the registry
    /// disagree about chunk geometry; it is reported and counted but does
    /// not abort the scan; the remaining tiles are still valid.
    pub fn scan_store(&mut self, store: &dyn ChunkStore) -> ChunkResult<ScanReport> {
        let offsets = store.allocated_chunks()?;
        info!(allocated = offsets.len(), "scanning store for existing chunks");

        let mut report = ScanReport::default();
        for offset in offsets {
            if offset.len() != self.chunk_dims.len() {
                error!(?offset, rank = self.chunk_dims.len(), "chunk offset has wrong rank");
                report.rejected += 1;
                continue;
            }

            let coords: Vec<usize> = offset
                .iter()
                .zip(&self.chunk_dims)
                .map(|(&off, &chunk)| off / chunk)
                .collect();

            match self.tile_mut(&coords) {
                Some(tile) => {
                    tile.mark_on_disk();
                    report.reconciled += 1;
                }
                None => {
                    error!(?offset, ?coords, "store chunk outside registry grid");
                    report.rejected += 1;
                }
            }
        }

        info!(
            reconciled = report.reconciled,
            rejected = report.rejected,
            "store scan complete"
        );
        Ok(report)
    }

    fn linear_index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.grid_dims.len() {
            return None;
        }
        let mut index = 0usize;
        for (&coord, &extent) in coords.iter().zip(&self.grid_dims) {
            if coord >= extent {
                return None;
            }
            index = index * extent + coord;
        }
        Some(index)
    }
}

/// Reverse row-major linearization: flat index back to grid coordinates
fn delinearize(mut index: usize, grid_dims: &[usize]) -> Vec<usize> {
    let mut coords = vec![0usize; grid_dims.len()];
    for (coord, &extent) in coords.iter_mut().zip(grid_dims).rev() {
        *coord = index % extent;
        index /= extent;
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryChunkStore;

    /// 300^3 tensor with a 2 MiB chunk target gives 64^3 chunks on a 5^3 grid
    fn test_registry() -> TileRegistry {
        TileRegistry::new(&[300, 300, 300], 2 * 1024 * 1024).unwrap()
    }

    #[test]
    fn test_grid_is_ceiling_division() {
        let reg = test_registry();
        assert_eq!(reg.chunk_dims(), &[64, 64, 64]);
        assert_eq!(reg.grid_dims(), &[5, 5, 5]);
        assert_eq!(reg.total_tiles(), 125);
    }

    #[test]
    fn test_fresh_registry_is_all_virtual() {
        let reg = test_registry();
        assert_eq!(reg.count_status(TileStatus::Null), reg.total_tiles());
        assert!(reg.tiles().all(|t| t.buffer_id.is_none()));
    }

    #[test]
    fn test_tile_offsets_precomputed() {
        let reg = test_registry();
        let tile = reg.tile(&[1, 2, 3]).unwrap();
        assert_eq!(tile.coords, vec![1, 2, 3]);
        assert_eq!(tile.physical_offset, vec![64, 128, 192]);
    }

    #[test]
    fn test_delinearize_roundtrip() {
        let reg = test_registry();
        for (index, tile) in reg.tiles().enumerate() {
            assert_eq!(reg.linear_index(&tile.coords), Some(index));
        }
    }

    #[test]
    fn test_out_of_range_lookup() {
        let mut reg = test_registry();
        assert!(reg.tile(&[5, 0, 0]).is_none());
        assert!(reg.tile(&[0, 0, 5]).is_none());
        assert!(reg.tile(&[0, 0]).is_none());
        assert!(reg.tile_mut(&[4, 5, 4]).is_none());
    }

    #[test]
    fn test_empty_shape_rejected() {
        assert!(matches!(
            TileRegistry::new(&[], 1024),
            Err(ChunkError::EmptyShape(_))
        ));
        assert!(matches!(
            TileRegistry::new(&[10, 0, 10], 1024),
            Err(ChunkError::EmptyShape(_))
        ));
    }

    #[test]
    fn test_scan_marks_written_tiles() {
        let mut reg = test_registry();
        let store =
            MemoryChunkStore::new(vec![300, 300, 300], reg.chunk_dims().to_vec()).unwrap();

        // Write the diagonal tiles (0,0,0), (1,1,1), (2,2,2)
        let elements: usize = reg.chunk_dims().iter().product();
        for i in 0..3usize {
            let offset: Vec<usize> = reg.chunk_dims().iter().map(|&c| c * i).collect();
            let shape: Vec<usize> = reg
                .chunk_dims()
                .iter()
                .zip(reg.global_dims())
                .zip(&offset)
                .map(|((&chunk, &global), &off)| chunk.min(global - off))
                .collect();
            let count: usize = shape.iter().product();
            store.write_chunk(&offset, &shape, &vec![1.0; count]).unwrap();
            assert!(count <= elements);
        }

        let report = reg.scan_store(&store).unwrap();
        assert_eq!(report, ScanReport { reconciled: 3, rejected: 0 });
        assert_eq!(reg.count_status(TileStatus::OnDisk), 3);
        assert_eq!(reg.count_status(TileStatus::Null), reg.total_tiles() - 3);

        for i in 0..3usize {
            assert_eq!(reg.tile(&[i, i, i]).unwrap().status, TileStatus::OnDisk);
        }
    }

    #[test]
    fn test_scan_rejects_offsets_outside_grid() {
        struct RogueStore;

        impl ChunkStore for RogueStore {
            fn read_chunk(&self, _: &[usize], shape: &[usize]) -> ChunkResult<Vec<f64>> {
                Ok(vec![0.0; shape.iter().product()])
            }
            fn write_chunk(&self, _: &[usize], _: &[usize], _: &[f64]) -> ChunkResult<()> {
                Ok(())
            }
            fn allocated_chunks(&self) -> ChunkResult<Vec<Vec<usize>>> {
                // One valid offset, one far outside the grid, one wrong rank
                Ok(vec![vec![0, 0, 0], vec![6400, 0, 0], vec![0, 0]])
            }
        }

        let mut reg = test_registry();
        let report = reg.scan_store(&RogueStore).unwrap();
        assert_eq!(report.reconciled, 1);
        assert_eq!(report.rejected, 2);
        assert_eq!(reg.count_status(TileStatus::OnDisk), 1);
    }

    #[test]
    fn test_status_transitions() {
        let mut reg = test_registry();
        let tile = reg.tile_mut(&[0, 0, 0]).unwrap();

        tile.mark_in_ram(7);
        assert_eq!(tile.status, TileStatus::InRam);
        assert_eq!(tile.buffer_id, Some(7));

        tile.release_to_disk();
        assert_eq!(tile.status, TileStatus::OnDisk);
        assert_eq!(tile.buffer_id, None);
        assert!(!tile.is_virtual());
    }
}
