//! Sync probe change computation.

use satchel_metadata::FileRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of change the client should act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The path exists on the server but not on the client, and was
    /// modified after the client's last sync.
    Created,
    /// The path exists on both sides with disagreeing content digests.
    Modified,
}

/// One change record for one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// A client's view of one of its files, as reported in a sync probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalFile {
    pub path: String,
    /// Whole-file digest, lowercase hex.
    pub digest: String,
}

/// Diff the server's live file set against a client-reported file list.
///
/// Emits at most one record per path. The inverse direction (client has a
/// file the server lacks) is handled by the client's own upload path and is
/// not emitted here.
pub fn compute_changes(
    server_files: &[FileRow],
    local_files: &[LocalFile],
    last_sync: i64,
) -> Vec<FileChange> {
    let by_path: HashMap<&str, &LocalFile> = local_files
        .iter()
        .map(|f| (f.path.as_str(), f))
        .collect();

    let mut changes = Vec::new();
    for server_file in server_files {
        match by_path.get(server_file.path.as_str()) {
            Some(local) => {
                if local.digest != server_file.digest {
                    changes.push(FileChange {
                        path: server_file.path.clone(),
                        kind: ChangeKind::Modified,
                    });
                }
            }
            None => {
                if server_file.modified_time > last_sync {
                    changes.push(FileChange {
                        path: server_file.path.clone(),
                        kind: ChangeKind::Created,
                    });
                }
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_file(path: &str, digest: &str, mtime: i64) -> FileRow {
        FileRow {
            path: path.to_string(),
            size: 10,
            modified_time: mtime,
            digest: digest.to_string(),
            version: 1,
            is_directory: false,
            deleted: false,
            last_sync_time: 0,
        }
    }

    fn local(path: &str, digest: &str) -> LocalFile {
        LocalFile {
            path: path.to_string(),
            digest: digest.to_string(),
        }
    }

    #[test]
    fn test_modified_and_created() {
        let server = vec![server_file("a", "h1", 50), server_file("b", "h2", 50)];
        let client = vec![local("a", "h1-different"), local("c", "h3")];

        let mut changes = compute_changes(&server, &client, 0);
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "a");
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[1].path, "b");
        assert_eq!(changes[1].kind, ChangeKind::Created);
    }

    #[test]
    fn test_matching_digest_is_silent() {
        let server = vec![server_file("a", "h1", 50)];
        let client = vec![local("a", "h1")];
        assert!(compute_changes(&server, &client, 0).is_empty());
    }

    #[test]
    fn test_stale_server_file_not_created() {
        // Server-only path older than the client's last sync: the client
        // saw it before and deleted it locally; do not resurrect.
        let server = vec![server_file("a", "h1", 50)];
        assert!(compute_changes(&server, &[], 100).is_empty());
    }

    #[test]
    fn test_at_most_one_record_per_path() {
        let server = vec![server_file("a", "h1", 50)];
        let client = vec![local("a", "other"), local("a", "other-again")];
        let changes = compute_changes(&server, &client, 0);
        assert_eq!(changes.len(), 1);
    }
}
