//! Filesystem change events produced by the watcher, consumed by the queue.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub detected_at: DateTime<Utc>,
}

/// A snapshot of a single watched file, persisted so a periodic scan can
/// detect changes that happened while nothing was watching (e.g. a restart).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub size: u64,
    pub mtime_unix: i64,
    pub content_hash: String,
}
