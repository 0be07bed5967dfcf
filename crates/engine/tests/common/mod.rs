//! Common test utilities and fixtures.

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use bytes::Bytes;
use satchel_core::{ChunkInfo, Chunker, EngineConfig};
use satchel_engine::StorageManager;
use satchel_metadata::FileRow;

/// Build a manager rooted in a fresh temp directory.
pub async fn test_manager() -> (tempfile::TempDir, StorageManager) {
    let temp = tempfile::tempdir().unwrap();
    let manager = StorageManager::open(EngineConfig::new(temp.path()))
        .await
        .unwrap();
    (temp, manager)
}

/// Chunk `data`, upload every chunk, and finalize the file.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub async fn upload_file(
    manager: &StorageManager,
    client_id: &str,
    path: &str,
    data: &[u8],
) -> (Vec<ChunkInfo>, FileRow) {
    let mut chunker = Chunker::new();
    let chunks = chunker.chunk_data(data);

    manager.begin_upload(client_id, path).await.unwrap();
    for (index, chunk) in chunks.iter().enumerate() {
        let start = chunk.offset as usize;
        let end = start + chunk.size as usize;
        manager
            .store_chunk(
                client_id,
                path,
                index as u64,
                Bytes::copy_from_slice(&data[start..end]),
                &chunk.digest.to_hex(),
            )
            .await
            .unwrap();
    }

    let record = manager
        .finalize_file(client_id, path, chunks.len() as u64)
        .await
        .unwrap();

    (chunks, record)
}
