//! Error taxonomy for the job queue and the pipeline handlers it drives.

use thiserror::Error;

/// The observable error codes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    Conflict,
    InvalidArgument,
    QueueFull,
    PreconditionFailed,
    Unavailable,
    Internal,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A transient failure worth retrying with backoff (embedding/vector
    /// store timeouts, single-file parse errors that don't abort the batch).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unrecoverable; the job fails without consuming a retry.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("job was cancelled")]
    Cancelled,

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    pub fn code(&self) -> ErrorCode {
        match self {
            JobError::NotFound(_) => ErrorCode::NotFound,
            JobError::Conflict(_) => ErrorCode::Conflict,
            JobError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            JobError::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            JobError::Transient(_) => ErrorCode::Unavailable,
            JobError::Fatal(_) | JobError::Cancelled => ErrorCode::Internal,
            JobError::Database(_) | JobError::Io(_) | JobError::Serialization(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// Whether this failure should consume a retry attempt rather than
    /// failing the job outright.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Transient(_) | JobError::Database(_) | JobError::Io(_))
    }
}

pub type JobResult<T> = Result<T, JobError>;
