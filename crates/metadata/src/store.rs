//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ChunkBindingRow, FileRow};
use crate::repos::{BindingRepo, FileRepo, SyncStateRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: FileRepo + BindingRepo + SyncStateRepo + Send + Sync {
    /// Run idempotent schema creation.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-backed metadata store for a single client.
pub struct ClientStore {
    pool: Pool<Sqlite>,
}

impl ClientStore {
    /// Open or create the store at the given database path.
    pub async fn open(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        // SQLite permits limited write concurrency; a single connection
        // serializes writers and avoids persistent "database is locked"
        // failures when several finalizes land on one client.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(db = %path.display(), "opened client metadata store");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for ClientStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FileRepo for ClientStore {
    async fn upsert_file(&self, record: &FileRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO files
                (path, size, modified_time, digest, version, is_directory, deleted, last_sync_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.path)
        .bind(record.size)
        .bind(record.modified_time)
        .bind(&record.digest)
        .bind(record.version)
        .bind(record.is_directory)
        .bind(record.deleted)
        .bind(record.last_sync_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_file(&self, path: &str) -> MetadataResult<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_live(&self) -> MetadataResult<Vec<FileRow>> {
        let rows = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE deleted = 0")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn modified_since(&self, timestamp: i64) -> MetadataResult<Vec<FileRow>> {
        let rows = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE modified_time > ?")
            .bind(timestamp)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn tombstone(&self, path: &str) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE files SET deleted = 1 WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("file {path}")));
        }
        Ok(())
    }

    async fn commit_finalized(
        &self,
        record: &FileRow,
        offsets: &[(i64, i64)],
    ) -> MetadataResult<i64> {
        // The transaction rolls back on drop; a commit error leaves the
        // pre-transaction state.
        let mut tx = self.pool.begin().await?;

        let prior = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE path = ?")
            .bind(&record.path)
            .fetch_optional(&mut *tx)
            .await?;

        let version = prior.as_ref().map(|p| p.version + 1).unwrap_or(1);
        let last_sync_time = prior.as_ref().map(|p| p.last_sync_time).unwrap_or(0);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO files
                (path, size, modified_time, digest, version, is_directory, deleted, last_sync_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.path)
        .bind(record.size)
        .bind(record.modified_time)
        .bind(&record.digest)
        .bind(version)
        .bind(record.is_directory)
        .bind(record.deleted)
        .bind(last_sync_time)
        .execute(&mut *tx)
        .await?;

        for &(chunk_index, offset) in offsets {
            sqlx::query(
                r#"UPDATE chunks SET "offset" = ? WHERE file_path = ? AND chunk_index = ?"#,
            )
            .bind(offset)
            .bind(&record.path)
            .bind(chunk_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(version)
    }
}

#[async_trait]
impl BindingRepo for ClientStore {
    async fn insert_binding(&self, binding: &ChunkBindingRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chunks (file_path, chunk_index, digest, "offset", size)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_path, chunk_index) DO UPDATE SET
                digest = excluded.digest,
                "offset" = excluded."offset",
                size = excluded.size
            "#,
        )
        .bind(&binding.file_path)
        .bind(binding.chunk_index)
        .bind(&binding.digest)
        .bind(binding.offset)
        .bind(binding.size)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bindings_for(&self, path: &str) -> MetadataResult<Vec<ChunkBindingRow>> {
        let rows = sqlx::query_as::<_, ChunkBindingRow>(
            "SELECT * FROM chunks WHERE file_path = ? ORDER BY chunk_index ASC",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn clear_bindings(&self, path: &str) -> MetadataResult<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE file_path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn chunk_exists(&self, digest: &str) -> MetadataResult<bool> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM chunks WHERE digest = ? LIMIT 1")
                .bind(digest)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl SyncStateRepo for ClientStore {
    async fn get_last_sync(&self) -> MetadataResult<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT value FROM sync_state WHERE key = 'last_sync_time'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v).unwrap_or(0))
    }

    async fn set_last_sync(&self, timestamp: i64) -> MetadataResult<()> {
        sqlx::query("INSERT OR REPLACE INTO sync_state (key, value) VALUES ('last_sync_time', ?)")
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
-- Tracked files, one row per path. Tombstoned rows stay for sync bookkeeping.
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY,
    size INTEGER NOT NULL DEFAULT 0,
    modified_time INTEGER NOT NULL DEFAULT 0,
    digest TEXT NOT NULL DEFAULT '',
    version INTEGER NOT NULL DEFAULT 1,
    is_directory INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0,
    last_sync_time INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_files_modified ON files(modified_time);

-- Chunk bindings: which digest sits at which index of which file.
CREATE TABLE IF NOT EXISTS chunks (
    file_path TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    digest TEXT NOT NULL,
    "offset" INTEGER NOT NULL DEFAULT 0,
    size INTEGER NOT NULL,
    PRIMARY KEY (file_path, chunk_index)
);
CREATE INDEX IF NOT EXISTS idx_chunks_digest ON chunks(digest);

-- Per-client key -> integer sync state.
CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn file_row(path: &str, digest: &str, mtime: i64) -> FileRow {
        FileRow {
            path: path.to_string(),
            size: 128,
            modified_time: mtime,
            digest: digest.to_string(),
            version: 1,
            is_directory: false,
            deleted: false,
            last_sync_time: 0,
        }
    }

    fn binding(path: &str, index: i64, digest: &str, size: i64) -> ChunkBindingRow {
        ChunkBindingRow {
            file_path: path.to_string(),
            chunk_index: index,
            digest: digest.to_string(),
            offset: 0,
            size,
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> ClientStore {
        ClientStore::open(dir.path().join("metadata.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.db");

        let store = ClientStore::open(&path).await.unwrap();
        store
            .upsert_file(&file_row("docs/a.txt", "aa", 100))
            .await
            .unwrap();
        drop(store);

        // Reopening must keep existing rows and re-run the schema safely.
        let store = ClientStore::open(&path).await.unwrap();
        let record = store.get_file("docs/a.txt").await.unwrap().unwrap();
        assert_eq!(record.digest, "aa");
    }

    #[tokio::test]
    async fn test_upsert_replaces_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert_file(&file_row("a", "d1", 10)).await.unwrap();
        let mut updated = file_row("a", "d2", 20);
        updated.version = 2;
        store.upsert_file(&updated).await.unwrap();

        let record = store.get_file("a").await.unwrap().unwrap();
        assert_eq!(record.digest, "d2");
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn test_get_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.get_file("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_live_excludes_tombstoned() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert_file(&file_row("keep", "d1", 10)).await.unwrap();
        store.upsert_file(&file_row("drop", "d2", 10)).await.unwrap();
        store.tombstone("drop").await.unwrap();

        let live = store.list_live().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].path, "keep");

        // The tombstoned row is retained, flagged deleted.
        let dropped = store.get_file("drop").await.unwrap().unwrap();
        assert!(dropped.deleted);
    }

    #[tokio::test]
    async fn test_tombstone_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(matches!(
            store.tombstone("ghost").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_modified_since_is_strict() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert_file(&file_row("old", "d1", 100)).await.unwrap();
        store.upsert_file(&file_row("new", "d2", 200)).await.unwrap();

        let modified = store.modified_since(100).await.unwrap();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].path, "new");
    }

    #[tokio::test]
    async fn test_bindings_ordered_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        // Insert out of order; reads must come back index-ascending.
        for index in [2i64, 0, 1] {
            store
                .insert_binding(&binding("f", index, &format!("digest-{index}"), 64))
                .await
                .unwrap();
        }

        let bindings = store.bindings_for("f").await.unwrap();
        let indexes: Vec<i64> = bindings.iter().map(|b| b.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_insert_binding_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert_binding(&binding("f", 0, "first", 64)).await.unwrap();
        store.insert_binding(&binding("f", 0, "second", 96)).await.unwrap();

        let bindings = store.bindings_for("f").await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].digest, "second");
        assert_eq!(bindings[0].size, 96);
    }

    #[tokio::test]
    async fn test_clear_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert_binding(&binding("f", 0, "d0", 64)).await.unwrap();
        store.insert_binding(&binding("f", 1, "d1", 64)).await.unwrap();
        store.insert_binding(&binding("g", 0, "d2", 64)).await.unwrap();

        assert_eq!(store.clear_bindings("f").await.unwrap(), 2);
        assert!(store.bindings_for("f").await.unwrap().is_empty());
        assert_eq!(store.bindings_for("g").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chunk_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert_binding(&binding("f", 0, "present", 64)).await.unwrap();
        assert!(store.chunk_exists("present").await.unwrap());
        assert!(!store.chunk_exists("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_sync_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert_eq!(store.get_last_sync().await.unwrap(), 0);
        store.set_last_sync(1_700_000_000).await.unwrap();
        assert_eq!(store.get_last_sync().await.unwrap(), 1_700_000_000);
        store.set_last_sync(1_700_000_060).await.unwrap();
        assert_eq!(store.get_last_sync().await.unwrap(), 1_700_000_060);
    }

    #[tokio::test]
    async fn test_commit_finalized_assigns_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.insert_binding(&binding("f", 0, "d0", 64)).await.unwrap();
        store.insert_binding(&binding("f", 1, "d1", 32)).await.unwrap();

        let v1 = store
            .commit_finalized(&file_row("f", "whole-1", 500), &[(0, 0), (1, 64)])
            .await
            .unwrap();
        assert_eq!(v1, 1);

        let v2 = store
            .commit_finalized(&file_row("f", "whole-2", 600), &[(0, 0), (1, 64)])
            .await
            .unwrap();
        assert_eq!(v2, 2);

        let record = store.get_file("f").await.unwrap().unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.digest, "whole-2");

        let bindings = store.bindings_for("f").await.unwrap();
        assert_eq!(bindings[0].offset, 0);
        assert_eq!(bindings[1].offset, 64);
    }

    #[tokio::test]
    async fn test_commit_finalized_preserves_last_sync() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let mut seeded = file_row("f", "d", 100);
        seeded.last_sync_time = 42;
        store.upsert_file(&seeded).await.unwrap();

        store
            .commit_finalized(&file_row("f", "d2", 200), &[])
            .await
            .unwrap();

        let record = store.get_file("f").await.unwrap().unwrap();
        assert_eq!(record.last_sync_time, 42);
        assert_eq!(record.version, 2);
    }
}
