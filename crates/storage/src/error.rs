//! Storage error types.

use thiserror::Error;

/// Chunk store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chunk not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
