//! The Collection aggregate: a named, watched vault of markdown notes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::job::JobKind;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").expect("valid regex"));

/// Bytes attributed to each indexed document for the `size_bytes` estimate.
///
/// Preserved from the system this was distilled from rather than derived
/// from real content size; revisit only if a real storage backend replaces it.
pub const BYTES_PER_DOCUMENT: u64 = 2048;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectionNameError {
    #[error("collection name must match ^[A-Za-z0-9_-]{{1,100}}$, got {0:?}")]
    Invalid(String),
}

/// Validate a collection name against the allowed pattern.
pub fn validate_name(name: &str) -> Result<(), CollectionNameError> {
    if NAME_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(CollectionNameError::Invalid(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredStatus {
    Created,
    Active,
    Error,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Empty,
    Healthy,
    Warning,
    Error,
}

/// The only status observers ever see: stored state folded with whatever
/// job is presently touching this collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedStatus {
    Created,
    Active,
    Error,
    Paused,
    Indexing,
    Reindexing,
    Updating,
    Deleting,
}

impl DerivedStatus {
    /// Fold a stored status with the kind of job presently running against
    /// the collection, if any. An active job always wins.
    pub fn derive(stored: StoredStatus, active_job_kind: Option<JobKind>) -> Self {
        match active_job_kind {
            Some(JobKind::Index) => DerivedStatus::Indexing,
            Some(JobKind::Reindex) => DerivedStatus::Reindexing,
            Some(JobKind::IncrementalUpdate) => DerivedStatus::Updating,
            Some(JobKind::Delete) => DerivedStatus::Deleting,
            None => match stored {
                StoredStatus::Created => DerivedStatus::Created,
                StoredStatus::Active => DerivedStatus::Active,
                StoredStatus::Error => DerivedStatus::Error,
                StoredStatus::Paused => DerivedStatus::Paused,
            },
        }
    }
}

/// Per-collection tunables. Changing `embedding_model` invalidates existing
/// vectors and schedules a reindex; changing `ignore_patterns` only affects
/// future scans and schedules an incremental rescan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub ignore_patterns: Vec<String>,
    pub debounce_ms: u64,
    pub scan_interval_s: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            embedding_model: "default".to_string(),
            chunk_size: 1_000,
            chunk_overlap: 100,
            ignore_patterns: Vec::new(),
            debounce_ms: 2_000,
            scan_interval_s: 300,
        }
    }
}

/// Which job kind, if any, a config update should schedule. A changed
/// `embedding_model` or chunk shape invalidates every existing vector and
/// needs a full reindex; a changed `ignore_patterns` only needs re-scanning.
pub fn config_update_job(old: &CollectionConfig, new: &CollectionConfig) -> Option<JobKind> {
    if old.embedding_model != new.embedding_model
        || old.chunk_size != new.chunk_size
        || old.chunk_overlap != new.chunk_overlap
    {
        Some(JobKind::Reindex)
    } else if old.ignore_patterns != new.ignore_patterns {
        Some(JobKind::IncrementalUpdate)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub source_path: PathBuf,
    pub config: CollectionConfig,
    pub document_count: u64,
    pub chunk_count: u64,
    pub stored_status: StoredStatus,
    pub health_status: HealthStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_indexed_at: Option<DateTime<Utc>>,
}

impl Collection {
    pub fn new(name: String, source_path: PathBuf, config: CollectionConfig, now: DateTime<Utc>) -> Self {
        Self {
            name,
            source_path,
            config,
            document_count: 0,
            chunk_count: 0,
            stored_status: StoredStatus::Created,
            health_status: HealthStatus::Unknown,
            last_error: None,
            created_at: now,
            updated_at: now,
            last_indexed_at: None,
        }
    }

    /// `size_bytes` is never measured, only estimated from document count.
    pub fn size_bytes(&self) -> u64 {
        self.document_count * BYTES_PER_DOCUMENT
    }

    pub fn status(&self, active_job_kind: Option<JobKind>) -> DerivedStatus {
        DerivedStatus::derive(self.stored_status, active_job_kind)
    }

    /// Recompute health from document count and last error, matching the
    /// unknown -> empty/healthy -> warning/error ladder.
    pub fn refresh_health(&mut self) {
        self.health_status = if self.last_error.is_some() {
            HealthStatus::Error
        } else if self.document_count == 0 {
            HealthStatus::Empty
        } else {
            HealthStatus::Healthy
        };
    }
}

/// The `.obsidian/` marker that must exist under `source_path` at create time.
pub fn has_obsidian_marker(source_path: &std::path::Path) -> bool {
    source_path.join(".obsidian").is_dir()
}
