//! Content-defined chunking.
//!
//! Splits byte streams into variable-size chunks whose boundaries depend on
//! content, so a localized edit invalidates only nearby chunks. The
//! constants below are part of the wire contract: peers with the same
//! constants must cut identical boundaries for identical input.

use crate::chunk::{ChunkHash, ChunkInfo};
use crate::rolling::RollingHash;
use std::path::Path;

/// Minimum chunk size. No chunk is smaller except the final tail.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Expected average chunk size.
pub const AVG_CHUNK_SIZE: usize = 64 * 1024;

/// Hard upper bound on chunk size.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of trailing zero bits required for a standard cut.
pub const MASK_BITS: u64 = 16;

/// Boundary mask derived from MASK_BITS.
pub const BOUNDARY_MASK: u64 = (1 << MASK_BITS) - 1;

/// Rolling hash window size in bytes.
pub const WINDOW_SIZE: usize = 48;

/// Normalization point between the small and main cut regions.
const NORMAL_CHUNK_SIZE: usize = MIN_CHUNK_SIZE + (AVG_CHUNK_SIZE - MIN_CHUNK_SIZE) / 2;

/// Statistics from the most recent chunking run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChunkerStats {
    /// Number of chunks emitted.
    pub total_chunks: usize,
    /// Smallest chunk size in bytes.
    pub min_size: usize,
    /// Largest chunk size in bytes.
    pub max_size: usize,
    /// Mean chunk size in bytes.
    pub avg_size: f64,
}

/// Content-defined chunker using a polynomial rolling hash.
#[derive(Debug, Default)]
pub struct Chunker {
    last_stats: ChunkerStats,
}

impl Chunker {
    /// Create a new chunker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics from the last `chunk_data` / `chunk_file` call.
    pub fn last_stats(&self) -> ChunkerStats {
        self.last_stats
    }

    /// Split a file's contents into content-defined chunks.
    pub async fn chunk_file(&mut self, path: impl AsRef<Path>) -> crate::Result<Vec<ChunkInfo>> {
        let data = tokio::fs::read(path.as_ref()).await?;
        Ok(self.chunk_data(&data))
    }

    /// Split a byte sequence into content-defined chunks.
    ///
    /// A cut happens when the rolling hash over the trailing window has the
    /// required number of zero bits, with the mask halved below the
    /// normalization point (one extra zero bit required there, so cuts are
    /// rarer in the small region), when the chunk reaches `MAX_CHUNK_SIZE`,
    /// or at the final byte.
    pub fn chunk_data(&mut self, data: &[u8]) -> Vec<ChunkInfo> {
        let mut chunks = Vec::new();

        if data.is_empty() {
            self.last_stats = ChunkerStats::default();
            return chunks;
        }

        let mut rolling = RollingHash::new(WINDOW_SIZE);
        let mut chunk_start = 0usize;
        let mut min_size = 0usize;
        let mut max_size = 0usize;
        let mut total_size = 0usize;

        for i in 0..data.len() {
            let chunk_size = i + 1 - chunk_start;

            if chunk_size <= WINDOW_SIZE {
                rolling.append(data[i]);
            } else {
                rolling.update(data[i], data[i - WINDOW_SIZE]);
            }

            let is_boundary = if chunk_size >= MIN_CHUNK_SIZE && chunk_size < NORMAL_CHUNK_SIZE {
                (rolling.hash() & (BOUNDARY_MASK >> 1)) == 0
            } else if chunk_size >= NORMAL_CHUNK_SIZE {
                (rolling.hash() & BOUNDARY_MASK) == 0
            } else {
                false
            };

            let max_size_reached = chunk_size >= MAX_CHUNK_SIZE;
            let is_last_byte = i == data.len() - 1;

            if is_boundary || max_size_reached || is_last_byte {
                let digest = ChunkHash::compute(&data[chunk_start..=i]);
                chunks.push(ChunkInfo::new(chunk_start as u64, chunk_size as u32, digest));

                if min_size == 0 || chunk_size < min_size {
                    min_size = chunk_size;
                }
                if chunk_size > max_size {
                    max_size = chunk_size;
                }
                total_size += chunk_size;

                chunk_start = i + 1;
                rolling.reset();
            }
        }

        self.last_stats = ChunkerStats {
            total_chunks: chunks.len(),
            min_size,
            max_size,
            avg_size: total_size as f64 / chunks.len() as f64,
        };

        chunks
    }
}
