//! Sync state repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;

/// Repository for the per-client key -> integer sync state.
#[async_trait]
pub trait SyncStateRepo: Send + Sync {
    /// Last sync time in epoch seconds; 0 if never synced.
    async fn get_last_sync(&self) -> MetadataResult<i64>;

    /// Record the last sync time in epoch seconds.
    async fn set_last_sync(&self, timestamp: i64) -> MetadataResult<()>;
}
