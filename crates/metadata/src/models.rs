//! Database models mapping to the metadata schema.
//!
//! Timestamps are whole seconds since the epoch, signed 64-bit, as exchanged
//! on the sync wire.

use sqlx::FromRow;

/// One tracked path for one client.
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    /// Normalized UTF-8 path; primary key.
    pub path: String,
    /// Total size in bytes.
    pub size: i64,
    /// Modification time in epoch seconds.
    pub modified_time: i64,
    /// Whole-file digest, lowercase hex.
    pub digest: String,
    /// Monotonically increasing version, starting at 1.
    pub version: i64,
    pub is_directory: bool,
    /// Tombstone flag. Tombstoned rows are kept for sync bookkeeping.
    pub deleted: bool,
    /// Last sync time in epoch seconds.
    pub last_sync_time: i64,
}

/// Binding of (file path, chunk index) to a chunk digest.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkBindingRow {
    pub file_path: String,
    pub chunk_index: i64,
    /// Chunk digest, lowercase hex.
    pub digest: String,
    /// Byte offset within the logical file.
    pub offset: i64,
    /// Chunk size in bytes.
    pub size: i64,
}
