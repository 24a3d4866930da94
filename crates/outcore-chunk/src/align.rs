//! Chunk alignment arithmetic
//!
//! Pure shape math tying logical tile shapes to the physical chunk grid of a
//! backing store. Nothing here touches I/O or holds state; the registry and
//! engine build on these helpers.

use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ChunkResult};

/// Number of bytes per stored sample
pub const ELEMENT_BYTES: usize = std::mem::size_of::<f64>();

/// Shape and size of one block staged between store and memory
///
/// `tile_shape` is the logical extent of the block, `chunk_shape` the
/// physical extent after alignment to the store's chunk granularity.
/// `bytes` is the logical payload size (`tile_shape` volume times the
/// caller's element size); transfer buffers are sized from `chunk_shape`,
/// not from this field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Logical tile extent per axis
    pub tile_shape: Vec<usize>,

    /// Aligned physical extent per axis (each a multiple of the alignment unit)
    pub chunk_shape: Vec<usize>,

    /// Logical payload size in bytes
    pub bytes: usize,
}

impl BlockDescriptor {
    /// Number of samples in the logical tile
    pub fn tile_elements(&self) -> usize {
        self.tile_shape.iter().product()
    }

    /// Number of samples in one physical chunk transfer
    pub fn chunk_elements(&self) -> usize {
        self.chunk_shape.iter().product()
    }

    /// Rank of the block
    pub fn rank(&self) -> usize {
        self.tile_shape.len()
    }
}

/// Align a tile shape up to the store's chunk granularity
///
/// Each axis of the result is the smallest multiple of the alignment unit
/// that covers the tile extent; an alignment of zero is treated as one.
/// The descriptor's `bytes` reflects the unaligned tile volume.
///
/// # Errors
///
/// Returns [`ChunkError::RankMismatch`] if the two shapes differ in rank.
pub fn align_chunk_to_tile(
    tile_shape: &[usize],
    chunk_alignment: &[usize],
    element_bytes: usize,
) -> ChunkResult<BlockDescriptor> {
    if tile_shape.len() != chunk_alignment.len() {
        return Err(ChunkError::RankMismatch {
            tile_rank: tile_shape.len(),
            align_rank: chunk_alignment.len(),
        });
    }

    let mut chunk_shape = Vec::with_capacity(tile_shape.len());
    let mut elements = 1usize;
    for (&tile, &align) in tile_shape.iter().zip(chunk_alignment) {
        let align = align.max(1);
        chunk_shape.push(tile.div_ceil(align) * align);
        elements *= tile;
    }

    Ok(BlockDescriptor {
        tile_shape: tile_shape.to_vec(),
        chunk_shape,
        bytes: elements * element_bytes,
    })
}

/// Choose near-cubic chunk dimensions for a target chunk byte size
///
/// Picks one side length `s = round((target_bytes / 8)^(1/rank))`, floors it
/// at 1, and clamps each axis to the global extent. Isotropic chunks keep
/// worst-case striding cost low for contraction access patterns; the byte
/// target is a guide, not an exact budget.
pub fn chunk_dims_for_budget(target_bytes: usize, global_dims: &[usize]) -> Vec<usize> {
    let rank = global_dims.len().max(1);
    let total_elements = (target_bytes / ELEMENT_BYTES) as f64;
    let side = total_elements.powf(1.0 / rank as f64).round() as usize;
    let side = side.max(1);

    global_dims.iter().map(|&dim| side.min(dim)).collect()
}

/// Convert logical tile coordinates into a physical element offset
///
/// Elementwise `coords[d] * chunk_dims[d]`: tile `(0, 1, 5)` on a
/// `(64, 64, 64)` chunk grid lives at offset `(0, 64, 320)`.
pub fn physical_offset(tile_coords: &[usize], chunk_dims: &[usize]) -> Vec<usize> {
    tile_coords
        .iter()
        .zip(chunk_dims)
        .map(|(&coord, &chunk)| coord * chunk)
        .collect()
}
