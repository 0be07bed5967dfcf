//! Delta computation and storage orchestration for the satchel sync engine.
//!
//! The [`StorageManager`] is the embedding surface: it owns the shared
//! content-addressed chunk store, creates per-client metadata stores on
//! first reference, accepts chunk uploads, finalizes files, and answers
//! sync probes. The [`DeltaEngine`] is the client-side half: it chunks a
//! local file and partitions against the digests the server reports.

pub mod changes;
pub mod conflict;
pub mod delta;
pub mod error;
pub mod manager;

pub use changes::{ChangeKind, FileChange, LocalFile, compute_changes};
pub use conflict::{ConflictInfo, ConflictStrategy, auto_resolve, has_conflict, resolve};
pub use delta::{Delta, DeltaEngine};
pub use error::{EngineError, EngineResult};
pub use manager::{FileChunk, StorageManager};
