//! Block metadata registry

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use outcore_chunk::BlockDescriptor;

/// Everything the engine needs to know about a block before fetching it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Logically all-zero: never materialized in storage, never fetched
    pub is_zero: bool,
    /// Location of the block inside the storage backend
    pub storage_path: String,
    /// Shape and size of the block
    pub descriptor: BlockDescriptor,
}

/// Catalog mapping block identity to its metadata
///
/// Consulted before every prefetch decision. Registration replaces any
/// prior entry for the key atomically; entries are immutable once stored.
#[derive(Default)]
pub struct MetadataRegistry {
    entries: DashMap<String, BlockMetadata>,
}

impl MetadataRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the metadata for a block
    pub fn register(&self, key: &str, metadata: BlockMetadata) {
        self.entries.insert(key.to_string(), metadata);
    }

    /// Look up a block's metadata
    pub fn lookup(&self, key: &str) -> Option<BlockMetadata> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// All registered block identities
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered blocks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no blocks are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
