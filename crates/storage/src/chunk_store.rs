//! Content-addressed chunk store on the local filesystem.
//!
//! A chunk with digest `h` lives at `<root>/chunks/<h[0..2]>/<h>`. The
//! filename is the content digest, so a blob is never overwritten: identical
//! digest means identical content.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use satchel_core::ChunkHash;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Content-addressed blob store for chunk payloads, shared across clients.
///
/// There is no in-process lock: the existence check plus atomic
/// rename-into-place is the mutual-exclusion primitive. Two concurrent
/// `put` calls for one digest both write identical content, and the
/// rename is idempotent.
pub struct ChunkStore {
    root: PathBuf,
    verify_reads: bool,
}

/// Aggregate statistics over the stored blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    /// Number of unique chunks stored.
    pub count: u64,
    /// Total bytes stored.
    pub total_bytes: u64,
}

impl ChunkStore {
    /// Open or create a chunk store rooted at the given directory.
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_options(root, false).await
    }

    /// Open with read-verification enabled or disabled.
    ///
    /// With `verify_reads`, every `get` recomputes the content digest and
    /// fails with a hash mismatch if it disagrees with the filename.
    pub async fn open_with_options(
        root: impl AsRef<Path>,
        verify_reads: bool,
    ) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("chunks")).await?;
        Ok(Self { root, verify_reads })
    }

    /// Path of the blob for a digest, under the two-character fan-out.
    fn blob_path(&self, digest: &ChunkHash) -> PathBuf {
        self.root.join(digest.to_object_key())
    }

    /// Store a chunk. Returns true if newly written, false if the blob
    /// already existed (deduplicated).
    #[instrument(skip(self, data), fields(digest = %digest, size = data.len()))]
    pub async fn put(&self, digest: &ChunkHash, data: Bytes) -> StorageResult<bool> {
        let path = self.blob_path(digest);

        if fs::try_exists(&path).await? {
            tracing::debug!("chunk already stored");
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a uniquely named temp file in the destination directory,
        // fsync, then rename into place. A crash mid-write leaves only a
        // temp file, never a truncated blob under the digest name.
        let temp_path = path.with_file_name(format!("{}.tmp.{}", digest.to_hex(), Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(true)
    }

    /// Get a chunk's full content.
    #[instrument(skip(self), fields(digest = %digest))]
    pub async fn get(&self, digest: &ChunkHash) -> StorageResult<Bytes> {
        let path = self.blob_path(digest);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(digest.to_hex())
            } else {
                StorageError::Io(e)
            }
        })?;

        if self.verify_reads {
            let actual = ChunkHash::compute(&data);
            if actual != *digest {
                return Err(StorageError::HashMismatch {
                    expected: digest.to_hex(),
                    actual: actual.to_hex(),
                });
            }
        }

        Ok(Bytes::from(data))
    }

    /// Check whether a chunk is stored.
    #[instrument(skip(self), fields(digest = %digest))]
    pub async fn exists(&self, digest: &ChunkHash) -> StorageResult<bool> {
        fs::try_exists(self.blob_path(digest))
            .await
            .map_err(StorageError::Io)
    }

    /// Walk the fan-out directories and report blob count and total bytes.
    pub async fn stats(&self) -> StorageResult<StoreStats> {
        let mut stats = StoreStats::default();
        let chunks_dir = self.root.join("chunks");

        let mut stack = vec![chunks_dir];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file() {
                    stats.count += 1;
                    stats.total_bytes += entry.metadata().await?.len();
                }
            }
        }

        Ok(stats)
    }
}
