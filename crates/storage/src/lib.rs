//! Content-addressed chunk storage for the satchel sync engine.
//!
//! Blobs are keyed by their SHA-256 digest under a two-character fan-out,
//! written atomically (temp file + rename), and deduplicated by
//! construction: a digest that already has a blob is never rewritten.

pub mod chunk_store;
pub mod error;

pub use chunk_store::{ChunkStore, StoreStats};
pub use error::{StorageError, StorageResult};
