//! Delta computation between a local file and a set of remote digests.

use crate::error::{EngineError, EngineResult};
use satchel_core::{Chunker, ChunkHash, ChunkInfo, hash_file};
use std::collections::HashSet;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// The subset of a file's chunks a remote party is missing, plus bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    /// Chunks the remote party does not have; these must be transferred.
    pub new_chunks: Vec<ChunkInfo>,
    /// Chunks the remote party already holds; transfer is omitted.
    pub existing_chunks: Vec<ChunkInfo>,
    /// Sum of sizes in `new_chunks`.
    pub bytes_to_transfer: u64,
}

/// Computes minimal transfer sets by chunking local files and partitioning
/// against the digests a remote party reports.
#[derive(Debug, Default)]
pub struct DeltaEngine {
    chunker: Chunker,
}

impl DeltaEngine {
    /// Create a new delta engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunk the local file and partition by membership in `remote_digests`.
    pub async fn compute_delta(
        &mut self,
        path: impl AsRef<Path>,
        remote_digests: &HashSet<ChunkHash>,
    ) -> EngineResult<Delta> {
        let local_chunks = self.chunker.chunk_file(path.as_ref()).await?;

        let mut delta = Delta::default();
        for chunk in local_chunks {
            if remote_digests.contains(&chunk.digest) {
                delta.existing_chunks.push(chunk);
            } else {
                delta.bytes_to_transfer += u64::from(chunk.size);
                delta.new_chunks.push(chunk);
            }
        }

        tracing::debug!(
            new = delta.new_chunks.len(),
            existing = delta.existing_chunks.len(),
            bytes = delta.bytes_to_transfer,
            "computed delta"
        );

        Ok(delta)
    }

    /// Write chunk payloads sequentially to `path`.
    ///
    /// `payload` must be the concatenation of the chunks' bytes in the same
    /// order as `chunks`; the call fails before writing anything if the
    /// total length disagrees with the declared sizes.
    pub async fn apply_delta(
        &self,
        path: impl AsRef<Path>,
        chunks: &[ChunkInfo],
        payload: &[u8],
    ) -> EngineResult<()> {
        let declared: u64 = chunks.iter().map(|c| u64::from(c.size)).sum();
        if declared != payload.len() as u64 {
            return Err(EngineError::InvalidArgument(format!(
                "payload is {} bytes but chunk list declares {}",
                payload.len(),
                declared
            )));
        }

        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        let mut data_offset = 0usize;
        for chunk in chunks {
            let end = data_offset + chunk.size as usize;
            file.write_all(&payload[data_offset..end]).await?;
            data_offset = end;
        }
        file.sync_all().await?;

        Ok(())
    }

    /// Whether two files have the same content digest.
    ///
    /// A file whose digest cannot be computed (unreadable, absent) is never
    /// identical to anything.
    pub async fn are_identical(
        &self,
        path1: impl AsRef<Path>,
        path2: impl AsRef<Path>,
    ) -> bool {
        match (hash_file(path1).await, hash_file(path2).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
