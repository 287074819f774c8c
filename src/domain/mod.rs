//! Core domain models.
//!
//! A `Collection` is a named, watched vault of markdown notes. `Job`s act on
//! collections through a closed set of tagged payload variants. `ChangeEvent`s
//! flow from the watcher into the queue. `ConfirmationToken`s gate deletion.

pub mod change_event;
pub mod collection;
pub mod job;
pub mod token;

pub use change_event::{ChangeEvent, ChangeKind, FileSnapshot};
pub use collection::{
    validate_name, Collection, CollectionConfig, CollectionNameError, DerivedStatus, HealthStatus,
    StoredStatus,
};
pub use job::{Job, JobId, JobKind, JobPayload, JobPriority, JobProgress, JobStatus};
pub use token::ConfirmationToken;
