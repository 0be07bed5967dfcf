//! Engine error types.

use thiserror::Error;

/// Storage engine operation errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("incomplete upload: expected {expected} chunks, got {actual}")]
    Incomplete { expected: u64, actual: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    #[error("core error: {0}")]
    Core(#[from] satchel_core::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] satchel_metadata::MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] satchel_storage::StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
