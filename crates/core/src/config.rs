//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory for chunk blobs and per-client state.
    pub storage_root: PathBuf,
    /// Recompute blob digests on every read and fail on disagreement.
    /// Off by default; content addressing already ties names to content.
    #[serde(default)]
    pub verify_reads: bool,
    /// Largest chunk payload accepted from a client, in bytes.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,
}

impl EngineConfig {
    /// Create a config rooted at the given directory with defaults.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            verify_reads: false,
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

fn default_max_chunk_bytes() -> u64 {
    crate::chunker::MAX_CHUNK_SIZE as u64
}
