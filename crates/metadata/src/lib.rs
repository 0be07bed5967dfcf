//! Per-client durable metadata for the satchel sync engine.
//!
//! Each client identity owns an isolated SQLite database recording its
//! tracked files, their chunk compositions, and sync state. The store is
//! exposed through narrow repository traits so the orchestrating layer can
//! hold trait objects and tests can substitute fakes.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ChunkBindingRow, FileRow};
pub use repos::{BindingRepo, FileRepo, SyncStateRepo};
pub use store::{ClientStore, MetadataStore};
