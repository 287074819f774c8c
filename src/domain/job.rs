//! Job identity, the tagged payload per job kind, and status/priority types.
//!
//! Payloads are a closed enum rather than an erased/dynamic job object: the
//! queue and dispatcher match on `JobKind`/`JobPayload` directly instead of
//! routing through a registry of boxed handlers.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Index,
    Reindex,
    IncrementalUpdate,
    Delete,
}

/// The data a job runs with, tagged by kind so the dispatcher never guesses
/// at the shape of `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Index {
        collection: String,
        force: bool,
    },
    Reindex {
        collection: String,
    },
    IncrementalUpdate {
        collection: String,
        added: Vec<PathBuf>,
        modified: Vec<PathBuf>,
        deleted: Vec<PathBuf>,
    },
    Delete {
        collection: String,
        confirmation_token: String,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Index { .. } => JobKind::Index,
            JobPayload::Reindex { .. } => JobKind::Reindex,
            JobPayload::IncrementalUpdate { .. } => JobKind::IncrementalUpdate,
            JobPayload::Delete { .. } => JobKind::Delete,
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            JobPayload::Index { collection, .. }
            | JobPayload::Reindex { collection }
            | JobPayload::IncrementalUpdate { collection, .. }
            | JobPayload::Delete { collection, .. } => collection,
        }
    }

    /// Merge a freshly detected change into an in-flight incremental_update
    /// payload, as the watcher does instead of enqueueing a second job.
    pub fn merge_incremental(&mut self, added: Vec<PathBuf>, modified: Vec<PathBuf>, deleted: Vec<PathBuf>) -> bool {
        if let JobPayload::IncrementalUpdate {
            added: a,
            modified: m,
            deleted: d,
            ..
        } = self
        {
            a.extend(added);
            m.extend(modified);
            d.extend(deleted);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Paused,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running | JobStatus::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobPriority(pub i32);

impl JobPriority {
    pub const LOW: JobPriority = JobPriority(-1);
    pub const NORMAL: JobPriority = JobPriority(0);
    pub const HIGH: JobPriority = JobPriority(1);
    pub const CRITICAL: JobPriority = JobPriority(10);
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Progress envelope reported over the event bus and persisted alongside a job.
/// `percent` must never decrease within a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub percent: f32,
    pub current_file: Option<String>,
    pub files_processed: u64,
    pub total_files: u64,
    pub documents_created: u64,
    pub chunks_created: u64,
    pub errors_count: u64,
    pub last_error: Option<String>,
    pub eta_seconds: Option<u64>,
}

impl JobProgress {
    /// Advance `percent`, clamping to never move backwards within a run.
    pub fn set_percent(&mut self, percent: f32) {
        self.percent = self.percent.max(percent.clamp(0.0, 100.0));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(payload: JobPayload, priority: JobPriority, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            payload,
            priority,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn collection(&self) -> &str {
        self.payload.collection()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
