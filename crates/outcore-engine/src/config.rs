//! Engine configuration

use serde::{Deserialize, Serialize};

/// Staging engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Byte budget for the block cache
    pub cache_bytes: usize,

    /// Bytes per side of the double-buffered staging area
    pub staging_bytes: usize,
}

impl EngineConfig {
    /// Size the engine from a cache budget, staging at half that budget
    pub fn with_cache_bytes(cache_bytes: usize) -> Self {
        Self {
            cache_bytes,
            staging_bytes: cache_bytes / 2,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_cache_bytes(256 * 1024 * 1024) // 256 MiB
    }
}
