//! Snapshot hashing and persistence for the periodic-scan half of the
//! watcher: `path -> (size, mtime, content_hash)` under `watcher/<name>.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::change_event::FileSnapshot;

pub async fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub async fn snapshot_file(path: &Path) -> std::io::Result<FileSnapshot> {
    let metadata = tokio::fs::metadata(path).await?;
    let mtime_unix = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(FileSnapshot { size: metadata.len(), mtime_unix, content_hash: hash_file(path).await? })
}

pub async fn load_snapshots(path: &Path) -> HashMap<PathBuf, FileSnapshot> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

pub async fn save_snapshots(path: &Path, snapshots: &HashMap<PathBuf, FileSnapshot>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(snapshots).unwrap_or_default();
    tokio::fs::write(path, json).await
}

/// Cheap pre-check before hashing: unchanged size+mtime means almost
/// certainly unchanged content.
pub fn looks_unchanged(previous: &FileSnapshot, size: u64, mtime_unix: i64) -> bool {
    previous.size == size && previous.mtime_unix == mtime_unix
}
