//! Sqlite-backed persistence for jobs: insert, status/progress updates, and
//! the `(priority DESC, created_at ASC)` candidate query the dispatcher uses.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::job::{Job, JobId, JobPayload, JobProgress, JobStatus};
use crate::infrastructure::database::entities::job::{self, Entity as JobEntity};

use super::error::{JobError, JobResult};

pub struct JobDb {
    conn: DatabaseConnection,
}

fn model_to_job(model: job::Model) -> JobResult<Job> {
    let payload: JobPayload = serde_json::from_str(&model.payload_json)?;
    let progress: JobProgress = serde_json::from_str(&model.progress_json)?;
    let status = JobStatus::from_str(&model.status)
        .map_err(|_| JobError::Fatal(format!("corrupt job status {:?}", model.status)))?;
    Ok(Job {
        id: JobId(uuid::Uuid::parse_str(&model.id).map_err(|e| JobError::Fatal(e.to_string()))?),
        payload,
        priority: crate::domain::job::JobPriority(model.priority),
        status,
        progress,
        retry_count: model.retry_count as u32,
        max_retries: model.max_retries as u32,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn status_str(status: JobStatus) -> String {
    status.to_string()
}

impl JobDb {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, job: &Job) -> JobResult<()> {
        let am = job::ActiveModel {
            id: Set(job.id.0.to_string()),
            collection: Set(job.collection().to_string()),
            payload_json: Set(serde_json::to_string(&job.payload)?),
            priority: Set(job.priority.0),
            status: Set(status_str(job.status)),
            progress_json: Set(serde_json::to_string(&job.progress)?),
            retry_count: Set(job.retry_count as i32),
            max_retries: Set(job.max_retries as i32),
            next_attempt_at: Set(job.created_at),
            created_at: Set(job.created_at),
            updated_at: Set(job.updated_at),
        };
        am.insert(&self.conn).await?;
        Ok(())
    }

    pub async fn get(&self, id: JobId) -> JobResult<Job> {
        let model = JobEntity::find_by_id(id.0.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        model_to_job(model)
    }

    pub async fn list_for_collection(&self, collection: &str) -> JobResult<Vec<Job>> {
        let models = JobEntity::find()
            .filter(job::Column::Collection.eq(collection))
            .order_by_desc(job::Column::CreatedAt)
            .all(&self.conn)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }

    pub async fn list_active(&self) -> JobResult<Vec<Job>> {
        let models = JobEntity::find()
            .filter(
                job::Column::Status
                    .is_in([
                        status_str(JobStatus::Pending),
                        status_str(JobStatus::Queued),
                        status_str(JobStatus::Running),
                        status_str(JobStatus::Paused),
                    ]),
            )
            .order_by_desc(job::Column::Priority)
            .order_by_asc(job::Column::CreatedAt)
            .all(&self.conn)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }

    pub async fn active_for_collection(&self, collection: &str) -> JobResult<Option<Job>> {
        let models = JobEntity::find()
            .filter(job::Column::Collection.eq(collection))
            .filter(
                job::Column::Status
                    .is_in([
                        status_str(JobStatus::Pending),
                        status_str(JobStatus::Queued),
                        status_str(JobStatus::Running),
                        status_str(JobStatus::Paused),
                    ]),
            )
            .one(&self.conn)
            .await?;
        models.map(model_to_job).transpose()
    }

    /// Next candidates to dispatch: pending/queued, due, ordered
    /// `(priority DESC, created_at ASC)`, excluding collections that already
    /// have a running job.
    pub async fn next_candidates(
        &self,
        exclude_collections: &[String],
        limit: usize,
        now: DateTime<Utc>,
    ) -> JobResult<Vec<Job>> {
        let mut query = JobEntity::find()
            .filter(
                job::Column::Status
                    .is_in([status_str(JobStatus::Pending), status_str(JobStatus::Queued)]),
            )
            .filter(job::Column::NextAttemptAt.lte(now));
        if !exclude_collections.is_empty() {
            query = query.filter(job::Column::Collection.is_not_in(exclude_collections.to_vec()));
        }
        let models = query
            .order_by_desc(job::Column::Priority)
            .order_by_asc(job::Column::CreatedAt)
            .all(&self.conn)
            .await?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for model in models {
            let job = model_to_job(model)?;
            if seen.insert(job.collection().to_string()) {
                out.push(job);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    pub async fn set_status(&self, id: JobId, status: JobStatus, now: DateTime<Utc>) -> JobResult<()> {
        let model = JobEntity::find_by_id(id.0.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let mut am: job::ActiveModel = model.into();
        am.status = Set(status_str(status));
        am.updated_at = Set(now);
        am.update(&self.conn).await?;
        Ok(())
    }

    pub async fn set_progress(&self, id: JobId, progress: &JobProgress, now: DateTime<Utc>) -> JobResult<()> {
        let model = JobEntity::find_by_id(id.0.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let mut am: job::ActiveModel = model.into();
        am.progress_json = Set(serde_json::to_string(progress)?);
        am.updated_at = Set(now);
        am.update(&self.conn).await?;
        Ok(())
    }

    /// Merge newly observed filesystem changes into this job's
    /// `incremental_update` payload, as the watcher does to avoid a second job.
    pub async fn merge_incremental_payload(&self, id: JobId, payload: &JobPayload, now: DateTime<Utc>) -> JobResult<()> {
        let model = JobEntity::find_by_id(id.0.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let mut am: job::ActiveModel = model.into();
        am.payload_json = Set(serde_json::to_string(payload)?);
        am.updated_at = Set(now);
        am.update(&self.conn).await?;
        Ok(())
    }

    /// Schedule a retry: bump `retry_count`, push `next_attempt_at` out by
    /// the caller-computed backoff, and return the job to `queued`.
    pub async fn schedule_retry(
        &self,
        id: JobId,
        retry_count: u32,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> JobResult<()> {
        let model = JobEntity::find_by_id(id.0.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let mut am: job::ActiveModel = model.into();
        am.status = Set(status_str(JobStatus::Queued));
        am.retry_count = Set(retry_count as i32);
        am.next_attempt_at = Set(next_attempt_at);
        am.updated_at = Set(now);
        am.update(&self.conn).await?;
        Ok(())
    }

    /// Crash recovery: any job left `running` from a prior process is
    /// demoted back to `queued` so the dispatcher picks it up again.
    pub async fn demote_running_to_queued(&self, now: DateTime<Utc>) -> JobResult<usize> {
        let models = JobEntity::find()
            .filter(job::Column::Status.eq(status_str(JobStatus::Running)))
            .all(&self.conn)
            .await?;
        let count = models.len();
        for model in models {
            let mut am: job::ActiveModel = model.into();
            am.status = Set(status_str(JobStatus::Queued));
            am.updated_at = Set(now);
            am.update(&self.conn).await?;
        }
        Ok(count)
    }

    /// Count of jobs currently in a single given terminal/non-terminal
    /// status, for `stats()`'s `failed`/`completed` counters.
    pub async fn count_by_status(&self, status: JobStatus) -> JobResult<usize> {
        let count = JobEntity::find().filter(job::Column::Status.eq(status_str(status))).count(&self.conn).await?;
        Ok(count as usize)
    }

    pub async fn running_collections(&self) -> JobResult<Vec<String>> {
        let models = JobEntity::find()
            .filter(job::Column::Status.eq(status_str(JobStatus::Running)))
            .all(&self.conn)
            .await?;
        Ok(models.into_iter().map(|m| m.collection).collect())
    }

    pub async fn count_running(&self) -> JobResult<usize> {
        Ok(self.running_collections().await?.len())
    }
}
