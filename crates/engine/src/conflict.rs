//! Conflict detection and resolution policy.
//!
//! The storage core only detects disagreement (same path, divergent
//! digests, both sides versioned); what to do about it is policy layered on
//! top of the storage invariants.

use std::path::Path;
use time::OffsetDateTime;

/// Both sides' view of one contested path.
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub path: String,
    pub local_digest: String,
    pub remote_digest: String,
    pub local_version: i64,
    pub remote_version: i64,
    /// Epoch seconds.
    pub local_modified_time: i64,
    /// Epoch seconds.
    pub remote_modified_time: i64,
}

/// How to settle a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    KeepLocal,
    KeepRemote,
    /// Keep the remote copy under the original name and rename the local
    /// copy to a conflicted-copy sibling.
    KeepBoth,
    /// Defer to the user.
    Manual,
}

/// Whether the two sides genuinely conflict: digests differ and both
/// versions have been written at least once.
pub fn has_conflict(info: &ConflictInfo) -> bool {
    if info.local_digest == info.remote_digest {
        return false;
    }
    info.local_version > 0 && info.remote_version > 0
}

/// Last-write-wins by modification time; equal timestamps keep both.
pub fn auto_resolve(info: &ConflictInfo) -> ConflictStrategy {
    if info.local_modified_time > info.remote_modified_time {
        ConflictStrategy::KeepLocal
    } else if info.remote_modified_time > info.local_modified_time {
        ConflictStrategy::KeepRemote
    } else {
        ConflictStrategy::KeepBoth
    }
}

/// Resolve a conflict to the path the local content should live under.
///
/// Returns `None` for [`ConflictStrategy::Manual`].
pub fn resolve(
    info: &ConflictInfo,
    strategy: ConflictStrategy,
    client_id: &str,
    now: OffsetDateTime,
) -> Option<String> {
    match strategy {
        ConflictStrategy::KeepLocal | ConflictStrategy::KeepRemote => Some(info.path.clone()),
        ConflictStrategy::KeepBoth => Some(conflict_name(&info.path, client_id, now)),
        ConflictStrategy::Manual => None,
    }
}

/// Sibling name for a conflicted local copy, e.g.
/// `notes (conflicted copy laptop 2026-08-02 10-15-30).txt`.
///
/// The timestamp is UTC so every replica names the same conflict the same
/// way.
pub fn conflict_name(original_path: &str, client_id: &str, now: OffsetDateTime) -> String {
    let path = Path::new(original_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stamp = format!(
        "{:04}-{:02}-{:02} {:02}-{:02}-{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    );

    let mut name = format!("{stem} (conflicted copy {client_id} {stamp})");
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext);
    }

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            format!("{}/{}", parent.to_string_lossy(), name)
        }
        _ => name,
    }
}
