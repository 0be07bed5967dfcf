//! Chunk binding repository trait.

use crate::error::MetadataResult;
use crate::models::ChunkBindingRow;
use async_trait::async_trait;

/// Repository for (file path, chunk index) -> digest bindings.
#[async_trait]
pub trait BindingRepo: Send + Sync {
    /// Upsert on the (file_path, chunk_index) composite key.
    async fn insert_binding(&self, binding: &ChunkBindingRow) -> MetadataResult<()>;

    /// Bindings for a path ordered by `chunk_index` ascending.
    ///
    /// The ordering is load-bearing: file reconstruction concatenates
    /// chunk payloads in exactly this order.
    async fn bindings_for(&self, path: &str) -> MetadataResult<Vec<ChunkBindingRow>>;

    /// Remove all bindings for a path. Returns the number removed.
    async fn clear_bindings(&self, path: &str) -> MetadataResult<u64>;

    /// Whether any binding references this digest.
    async fn chunk_exists(&self, digest: &str) -> MetadataResult<bool>;
}
