//! Chunk types and hashing.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chunk hash (SHA-256 of chunk contents).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkHash(ContentHash);

impl ChunkHash {
    /// Create from a ContentHash.
    pub fn from_content_hash(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// Compute the hash of chunk data.
    pub fn compute(data: &[u8]) -> Self {
        Self(ContentHash::compute(data))
    }

    /// Get the underlying content hash.
    pub fn content_hash(&self) -> &ContentHash {
        &self.0
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        Ok(Self(ContentHash::from_hex(s)?))
    }

    /// Encode as hex string.
    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    /// Get the blob store key for this chunk.
    ///
    /// The two-character fan-out keeps any single directory below
    /// per-directory inode limits at high chunk counts.
    pub fn to_object_key(&self) -> String {
        let hex = self.to_hex();
        format!("chunks/{}/{}", &hex[..2], hex)
    }
}

impl fmt::Debug for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ChunkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Metadata about one chunk of a file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Byte offset within the logical file.
    pub offset: u64,
    /// Size in bytes.
    pub size: u32,
    /// The chunk digest.
    pub digest: ChunkHash,
}

impl ChunkInfo {
    /// Create new chunk info.
    pub fn new(offset: u64, size: u32, digest: ChunkHash) -> Self {
        Self {
            offset,
            size,
            digest,
        }
    }
}

/// A chunk with its data.
#[derive(Clone)]
pub struct Chunk {
    /// The chunk hash (computed from data).
    pub hash: ChunkHash,
    /// The chunk data.
    pub data: bytes::Bytes,
}

impl Chunk {
    /// Create a new chunk from data, computing the hash.
    pub fn new(data: bytes::Bytes) -> Self {
        let hash = ChunkHash::compute(&data);
        Self { hash, data }
    }

    /// Verify that the data matches the expected hash.
    pub fn verify(&self, expected: &ChunkHash) -> crate::Result<()> {
        if &self.hash != expected {
            return Err(crate::Error::HashMismatch {
                expected: expected.to_hex(),
                actual: self.hash.to_hex(),
            });
        }
        Ok(())
    }

    /// Get the chunk size.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_hash_object_key() {
        let hash = ChunkHash::compute(b"test");
        let key = hash.to_object_key();
        assert!(key.starts_with("chunks/"));
        let parts: Vec<_> = key.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 64);
        assert_eq!(&parts[2][..2], parts[1]);
    }

    #[test]
    fn test_chunk_verify() {
        let chunk = Chunk::new(bytes::Bytes::from_static(b"payload"));
        assert!(chunk.verify(&chunk.hash).is_ok());

        let other = ChunkHash::compute(b"different");
        assert!(chunk.verify(&other).is_err());
    }
}
