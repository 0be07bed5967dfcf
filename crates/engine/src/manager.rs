//! Storage orchestration across the chunk store and per-client metadata.

use crate::changes::{FileChange, LocalFile, compute_changes};
use crate::error::{EngineError, EngineResult};
use bytes::Bytes;
use satchel_core::{Chunk, ChunkHash, EngineConfig, hash_file};
use satchel_metadata::{
    BindingRepo, ChunkBindingRow, ClientStore, FileRepo, FileRow, SyncStateRepo,
};
use satchel_storage::{ChunkStore, StoreStats};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One chunk of a finalized file, as streamed on the download path.
#[derive(Debug, Clone)]
pub struct FileChunk {
    /// Position in the file's chunk sequence (0-indexed).
    pub index: u64,
    /// The chunk digest.
    pub digest: ChunkHash,
    /// The chunk payload.
    pub data: Bytes,
}

/// Orchestrates one shared chunk store plus per-client metadata stores.
///
/// Client stores are created lazily on first reference and live for the
/// lifetime of the manager; the registry mutex covers only lookup and
/// insertion, never operations on an obtained handle.
pub struct StorageManager {
    config: EngineConfig,
    chunks: Arc<ChunkStore>,
    clients: Mutex<HashMap<String, Arc<ClientStore>>>,
}

impl StorageManager {
    /// Open a manager rooted at `config.storage_root`, creating the chunk
    /// store directories if absent.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        let chunks =
            ChunkStore::open_with_options(&config.storage_root, config.verify_reads).await?;
        tracing::info!(root = %config.storage_root.display(), "storage manager initialized");

        Ok(Self {
            config,
            chunks: Arc::new(chunks),
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// The shared chunk store.
    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Get or create the metadata store for a client.
    async fn client_store(&self, client_id: &str) -> EngineResult<Arc<ClientStore>> {
        validate_client_id(client_id)?;

        let mut clients = self.clients.lock().await;
        if let Some(store) = clients.get(client_id) {
            return Ok(store.clone());
        }

        let db_path = self.client_dir(client_id).join("metadata.db");
        let store = Arc::new(ClientStore::open(&db_path).await?);
        clients.insert(client_id.to_string(), store.clone());
        tracing::info!(client = client_id, "created client metadata store");

        Ok(store)
    }

    fn client_dir(&self, client_id: &str) -> PathBuf {
        self.config.storage_root.join("clients").join(client_id)
    }

    /// Begin (re-)uploading a file: drop any bindings left from a previous
    /// version so the new chunk list replaces the old one atomically.
    pub async fn begin_upload(&self, client_id: &str, path: &str) -> EngineResult<()> {
        validate_file_path(path)?;
        let store = self.client_store(client_id).await?;
        let cleared = store.clear_bindings(path).await?;
        if cleared > 0 {
            tracing::debug!(client = client_id, path, cleared, "cleared stale bindings");
        }
        Ok(())
    }

    /// Store one uploaded chunk: write the blob if absent and record the
    /// (path, index) binding. Idempotent in both stores.
    pub async fn store_chunk(
        &self,
        client_id: &str,
        path: &str,
        index: u64,
        data: Bytes,
        digest: &str,
    ) -> EngineResult<()> {
        validate_file_path(path)?;

        if data.is_empty() || data.len() as u64 > self.config.max_chunk_bytes {
            return Err(EngineError::InvalidArgument(format!(
                "chunk size {} out of range (1..={})",
                data.len(),
                self.config.max_chunk_bytes
            )));
        }

        let expected = ChunkHash::from_hex(digest)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        let chunk = Chunk::new(data);
        chunk.verify(&expected)?;

        let store = self.client_store(client_id).await?;
        self.chunks.put(&chunk.hash, chunk.data.clone()).await?;

        store
            .insert_binding(&ChunkBindingRow {
                file_path: path.to_string(),
                chunk_index: index as i64,
                digest: chunk.hash.to_hex(),
                // Rewritten to the observed offset at finalize.
                offset: 0,
                size: chunk.data.len() as i64,
            })
            .await?;

        Ok(())
    }

    /// Assemble a file from its uploaded chunks and commit a new version.
    ///
    /// Fails with [`EngineError::Incomplete`] when the recorded binding
    /// count disagrees with `total_chunks`; nothing is written in that
    /// case, and `get_file` keeps returning the prior state.
    pub async fn finalize_file(
        &self,
        client_id: &str,
        path: &str,
        total_chunks: u64,
    ) -> EngineResult<FileRow> {
        validate_file_path(path)?;
        let store = self.client_store(client_id).await?;

        let bindings = store.bindings_for(path).await?;
        if bindings.len() as u64 != total_chunks {
            return Err(EngineError::Incomplete {
                expected: total_chunks,
                actual: bindings.len() as u64,
            });
        }

        // Reconstruct into a client-scoped staging file, temp + rename like
        // the blob writes.
        let staging_path = self.client_dir(client_id).join("staging").join(path);
        if let Some(parent) = staging_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = staging_path.with_file_name(format!(
            "{}.tmp.{}",
            staging_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        ));

        let mut offsets = Vec::with_capacity(bindings.len());
        let mut observed_size = 0u64;
        {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            for binding in &bindings {
                let digest = ChunkHash::from_hex(&binding.digest)
                    .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
                let data = self.chunks.get(&digest).await?;
                file.write_all(&data).await?;
                offsets.push((binding.chunk_index, observed_size as i64));
                observed_size += data.len() as u64;
            }
            file.sync_all().await?;
        }

        let digest = hash_file(&temp_path).await?;
        tokio::fs::rename(&temp_path, &staging_path).await?;

        let record = FileRow {
            path: path.to_string(),
            size: observed_size as i64,
            modified_time: now_epoch_secs(),
            digest: digest.to_hex(),
            version: 0, // assigned by the store
            is_directory: false,
            deleted: false,
            last_sync_time: 0, // preserved by the store
        };
        let version = store.commit_finalized(&record, &offsets).await?;

        tracing::info!(
            client = client_id,
            path,
            size = observed_size,
            version,
            "finalized file"
        );

        Ok(FileRow { version, ..record })
    }

    /// Fetch one chunk blob by digest.
    pub async fn get_chunk(&self, digest: &str) -> EngineResult<Bytes> {
        let digest = ChunkHash::from_hex(digest)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        Ok(self.chunks.get(&digest).await?)
    }

    /// Whether the shared store holds a blob for this digest.
    pub async fn has_chunk(&self, digest: &str) -> EngineResult<bool> {
        let digest = ChunkHash::from_hex(digest)
            .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
        Ok(self.chunks.exists(&digest).await?)
    }

    /// The download mirror of upload: a file's `(index, digest, bytes)`
    /// records in index order. Callers that already hold a digest locally
    /// can skip its payload.
    pub async fn file_chunks(&self, client_id: &str, path: &str) -> EngineResult<Vec<FileChunk>> {
        validate_file_path(path)?;
        let store = self.client_store(client_id).await?;

        if store.get_file(path).await?.is_none() {
            return Err(EngineError::NotFound(format!("file {path}")));
        }

        let bindings = store.bindings_for(path).await?;
        let mut chunks = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let digest = ChunkHash::from_hex(&binding.digest)
                .map_err(|e| EngineError::InvalidArgument(e.to_string()))?;
            let data = self.chunks.get(&digest).await?;
            chunks.push(FileChunk {
                index: binding.chunk_index as u64,
                digest,
                data,
            });
        }

        Ok(chunks)
    }

    /// All live (non-tombstoned) files for a client.
    pub async fn list_files(&self, client_id: &str) -> EngineResult<Vec<FileRow>> {
        let store = self.client_store(client_id).await?;
        Ok(store.list_live().await?)
    }

    /// Metadata for one path, tombstoned or not.
    pub async fn get_metadata(
        &self,
        client_id: &str,
        path: &str,
    ) -> EngineResult<Option<FileRow>> {
        validate_file_path(path)?;
        let store = self.client_store(client_id).await?;
        Ok(store.get_file(path).await?)
    }

    /// Tombstone a file. The underlying blobs are retained; the store is
    /// append-only.
    pub async fn delete_file(&self, client_id: &str, path: &str) -> EngineResult<()> {
        validate_file_path(path)?;
        let store = self.client_store(client_id).await?;
        store.tombstone(path).await?;
        tracing::info!(client = client_id, path, "tombstoned file");
        Ok(())
    }

    /// Diff the client-reported file list against the server's live set.
    pub async fn compute_changes(
        &self,
        client_id: &str,
        local_files: &[LocalFile],
        last_sync: i64,
    ) -> EngineResult<Vec<FileChange>> {
        let store = self.client_store(client_id).await?;
        let server_files = store.list_live().await?;
        Ok(compute_changes(&server_files, local_files, last_sync))
    }

    /// Last recorded sync time for a client, 0 if never synced.
    pub async fn last_sync(&self, client_id: &str) -> EngineResult<i64> {
        let store = self.client_store(client_id).await?;
        Ok(store.get_last_sync().await?)
    }

    /// Record a client's sync time.
    pub async fn record_sync(&self, client_id: &str, timestamp: i64) -> EngineResult<()> {
        let store = self.client_store(client_id).await?;
        Ok(store.set_last_sync(timestamp).await?)
    }

    /// Aggregate chunk store statistics.
    pub async fn stats(&self) -> EngineResult<StoreStats> {
        Ok(self.chunks.stats().await?)
    }
}

/// Current wall-clock time in whole epoch seconds.
fn now_epoch_secs() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Client ids become directory names; restrict them accordingly.
fn validate_client_id(client_id: &str) -> EngineResult<()> {
    let ok = !client_id.is_empty()
        && client_id.len() <= 128
        && client_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && client_id != "."
        && client_id != "..";
    if !ok {
        return Err(EngineError::InvalidClientId(client_id.to_string()));
    }
    Ok(())
}

/// File paths are client-relative; reject anything that could escape the
/// client's staging directory.
fn validate_file_path(path: &str) -> EngineResult<()> {
    if path.is_empty() || path.starts_with('/') || path.contains('\\') {
        return Err(EngineError::InvalidArgument(format!("invalid path: {path}")));
    }
    for component in std::path::Path::new(path).components() {
        match component {
            std::path::Component::Normal(_) => {}
            _ => {
                return Err(EngineError::InvalidArgument(format!(
                    "unsafe path component in: {path}"
                )));
            }
        }
    }
    Ok(())
}
