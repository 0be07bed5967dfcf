//! File record repository trait.

use crate::error::MetadataResult;
use crate::models::FileRow;
use async_trait::async_trait;

/// Repository for tracked file records.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Atomically replace the row keyed by `record.path`.
    async fn upsert_file(&self, record: &FileRow) -> MetadataResult<()>;

    /// Get a file record by path. Never returns a partial row.
    async fn get_file(&self, path: &str) -> MetadataResult<Option<FileRow>>;

    /// All rows with `deleted = false`, unordered.
    async fn list_live(&self) -> MetadataResult<Vec<FileRow>>;

    /// All rows with `modified_time > timestamp`.
    async fn modified_since(&self, timestamp: i64) -> MetadataResult<Vec<FileRow>>;

    /// Set `deleted = true` without removing the row.
    async fn tombstone(&self, path: &str) -> MetadataResult<()>;

    /// Commit a finalized file state in one transaction: assign the next
    /// version (1 if the path is new), upsert the record, and rewrite the
    /// path's binding offsets to the observed `(chunk_index, offset)` pairs.
    ///
    /// `record.version` and `record.last_sync_time` are ignored; the version
    /// is computed inside the transaction so concurrent finalizes of the
    /// same path serialize, and the stored last-sync time is preserved.
    ///
    /// Returns the assigned version.
    async fn commit_finalized(
        &self,
        record: &FileRow,
        offsets: &[(i64, i64)],
    ) -> MetadataResult<i64>;
}
