//! Core domain types and shared logic for the satchel sync engine.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content digests and incremental file hashing
//! - The polynomial rolling hash behind content-defined chunking
//! - The chunker and its wire-contract constants
//! - Chunk metadata types
//! - Engine configuration

pub mod chunk;
pub mod chunker;
pub mod config;
pub mod error;
pub mod hash;
pub mod rolling;

pub use chunk::{Chunk, ChunkHash, ChunkInfo};
pub use chunker::{Chunker, ChunkerStats};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher, hash_file};
pub use rolling::RollingHash;
