use thiserror::Error;

use crate::domain::collection::CollectionNameError;
use crate::infrastructure::jobs::ErrorCode;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("collection not found: {0}")]
    NotFound(String),

    #[error("collection already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidName(#[from] CollectionNameError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::NotFound(_) => ErrorCode::NotFound,
            RegistryError::Conflict(_) => ErrorCode::Conflict,
            RegistryError::InvalidName(_) | RegistryError::InvalidArgument(_) => {
                ErrorCode::InvalidArgument
            }
            RegistryError::PreconditionFailed(_) => ErrorCode::PreconditionFailed,
            RegistryError::Database(_) | RegistryError::Serialization(_) => ErrorCode::Internal,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
