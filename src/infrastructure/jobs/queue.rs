//! The job queue: a single dispatcher task serializes every scheduling
//! decision under one lock, exactly as the system this was distilled from
//! did in its `_queue_processor` loop, woken on new-job/job-terminated
//! signals plus a periodic timer as a backstop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::domain::job::{Job, JobId, JobPayload, JobPriority, JobProgress, JobStatus};
use crate::infrastructure::events::{BusEvent, EventBus};
use crate::operations::collections::{ApplyJobResult, JobOutcome};

use super::database::JobDb;
use super::error::{JobError, JobResult};
use super::handle::{JobControl, JobHandle};

/// Context handed to a `JobRunner::run` invocation: how to report progress
/// and how to check for pause/cancel at batch boundaries.
pub struct JobRunContext {
    pub control: JobControl,
    pub progress: mpsc::UnboundedSender<JobProgress>,
}

/// Implemented once by the indexing pipeline; the queue never knows what a
/// job kind actually does, only that running one returns a result.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job, ctx: JobRunContext) -> JobResult<()>;
}

struct RunningEntry {
    handle: JobHandle,
    collection: String,
}

pub struct JobQueue {
    db: Arc<JobDb>,
    config: QueueConfig,
    runner: Arc<dyn JobRunner>,
    events: Arc<EventBus>,
    apply_result: Arc<dyn ApplyJobResult>,
    running: Mutex<HashMap<JobId, RunningEntry>>,
    dispatch_lock: Mutex<()>,
    notify: Notify,
}

impl JobQueue {
    /// Construct the queue and demote any job left `running` from a prior
    /// process back to `queued` so it gets picked up again.
    pub async fn new(
        db: Arc<JobDb>,
        config: QueueConfig,
        runner: Arc<dyn JobRunner>,
        events: Arc<EventBus>,
        apply_result: Arc<dyn ApplyJobResult>,
    ) -> JobResult<Arc<Self>> {
        let demoted = db.demote_running_to_queued(Utc::now()).await?;
        if demoted > 0 {
            warn!(count = demoted, "demoted running jobs back to queued on startup");
        }
        Ok(Arc::new(Self {
            db,
            config,
            runner,
            events,
            apply_result,
            running: Mutex::new(HashMap::new()),
            dispatch_lock: Mutex::new(()),
            notify: Notify::new(),
        }))
    }

    /// Spawn the background dispatcher. Call once per process.
    pub fn spawn_dispatcher(self: &Arc<Self>) {
        let queue = self.clone();
        tokio::spawn(async move { queue.dispatcher_loop().await });
    }

    async fn dispatcher_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.config.dispatch_interval_ms));
        loop {
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = ticker.tick() => {},
            }
            if let Err(e) = self.dispatch_once().await {
                error!(error = %e, "dispatch tick failed");
            }
        }
    }

    /// One scheduling decision, taken under `dispatch_lock` so concurrent
    /// wakeups never double-dispatch the same slot.
    async fn dispatch_once(self: &Arc<Self>) -> JobResult<()> {
        let _guard = self.dispatch_lock.lock().await;

        let running_count = self.running.lock().await.len();
        let available = self.config.max_concurrent.saturating_sub(running_count);
        if available == 0 {
            return Ok(());
        }

        let running_collections = {
            let running = self.running.lock().await;
            running.values().map(|r| r.collection.clone()).collect::<Vec<_>>()
        };

        let candidates = self.db.next_candidates(&running_collections, available, Utc::now()).await?;
        for job in candidates {
            self.start_job(job).await?;
        }
        Ok(())
    }

    async fn start_job(self: &Arc<Self>, mut job: Job) -> JobResult<()> {
        let now = Utc::now();
        job.status = JobStatus::Running;
        self.db.set_status(job.id, JobStatus::Running, now).await?;

        let (handle, progress_tx) = JobHandle::new(job.id, JobStatus::Running, 64);
        self.running.lock().await.insert(
            job.id,
            RunningEntry {
                handle: handle.clone(),
                collection: job.collection().to_string(),
            },
        );

        self.events
            .publish_job_event(
                job.id,
                job.collection(),
                BusEvent::StatusChange {
                    job_id: job.id,
                    collection: job.collection().to_string(),
                    status: JobStatus::Running,
                },
            )
            .await;

        let runner = self.runner.clone();
        let db = self.db.clone();
        let events = self.events.clone();
        let config = self.config.clone();
        let control = handle.control();
        let job_id = job.id;
        let collection = job.collection().to_string();
        let queue = self.clone();

        tokio::spawn(async move {
            let mut progress_rx = handle.subscribe_progress();
            let forward_events = events.clone();
            let forward_collection = collection.clone();
            let forward_db = db.clone();
            tokio::spawn(async move {
                while let Ok(progress) = progress_rx.recv().await {
                    let _ = forward_db.set_progress(job_id, &progress, Utc::now()).await;
                    forward_events
                        .publish_job_event(
                            job_id,
                            &forward_collection,
                            BusEvent::ProgressUpdate {
                                job_id,
                                collection: forward_collection.clone(),
                                progress,
                            },
                        )
                        .await;
                }
            });

            let ctx = JobRunContext { control: control.clone(), progress: progress_tx };
            let result = runner.run(&job, ctx).await;

            let final_status = match result {
                Ok(()) => JobStatus::Completed,
                Err(JobError::Cancelled) => JobStatus::Cancelled,
                Err(e) if e.is_retryable() && job.can_retry() => {
                    let retry_count = job.retry_count + 1;
                    let backoff = (config.retry_backoff_base_secs * 2u64.pow(retry_count - 1))
                        .min(config.retry_backoff_cap_secs);
                    let next_attempt = Utc::now() + chrono::Duration::seconds(backoff as i64);
                    info!(job = %job_id, retry_count, backoff, "scheduling retry after failure: {e}");
                    if let Err(e) = db.schedule_retry(job_id, retry_count, next_attempt, Utc::now()).await {
                        error!(error = %e, "failed to schedule retry");
                    }
                    handle.set_status(JobStatus::Queued);
                    queue.mark_finished(job_id).await;
                    return;
                }
                Err(e) => {
                    error!(job = %job_id, error = %e, "job failed");
                    if let Err(apply_err) = queue
                        .apply_result
                        .apply_job_result(&collection, JobOutcome { error: Some(e.to_string()), ..Default::default() })
                        .await
                    {
                        error!(error = %apply_err, "failed to mark collection as errored after job failure");
                    }
                    JobStatus::Failed
                }
            };

            let _ = db.set_status(job_id, final_status, Utc::now()).await;
            handle.set_status(final_status);
            events
                .publish_job_event(
                    job_id,
                    &collection,
                    BusEvent::StatusChange { job_id, collection: collection.clone(), status: final_status },
                )
                .await;
            queue.mark_finished(job_id).await;
        });

        Ok(())
    }

    /// Enforces the per-collection-uniqueness invariant: a fresh job is only
    /// accepted if no active job already exists for the collection, unless
    /// it merges into an in-flight `incremental_update`.
    pub async fn create(&self, payload: JobPayload, priority: JobPriority) -> JobResult<JobId> {
        if let Some(mut existing) = self.db.active_for_collection(payload.collection()).await? {
            if let JobPayload::IncrementalUpdate { added, modified, deleted, .. } = &payload {
                if existing.payload.merge_incremental(added.clone(), modified.clone(), deleted.clone()) {
                    self.db
                        .merge_incremental_payload(existing.id, &existing.payload, Utc::now())
                        .await?;
                    return Ok(existing.id);
                }
            }
            return Err(JobError::Conflict(format!(
                "collection {} already has an active job",
                payload.collection()
            )));
        }

        let job = Job::new(payload, priority, self.config.default_max_retries, Utc::now());
        let id = job.id;
        self.db.insert(&job).await?;
        self.notify.notify_waiters();
        Ok(id)
    }

    pub async fn get(&self, id: JobId) -> JobResult<Job> {
        self.db.get(id).await
    }

    pub async fn list_for_collection(&self, collection: &str) -> JobResult<Vec<Job>> {
        self.db.list_for_collection(collection).await
    }

    pub async fn list_active(&self) -> JobResult<Vec<Job>> {
        self.db.list_active().await
    }

    pub async fn active_for_collection(&self, collection: &str) -> JobResult<Option<Job>> {
        self.db.active_for_collection(collection).await
    }

    pub async fn pause(&self, id: JobId) -> JobResult<()> {
        let running = self.running.lock().await;
        let entry = running.get(&id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        entry.handle.pause();
        self.db.set_status(id, JobStatus::Paused, Utc::now()).await
    }

    pub async fn resume(&self, id: JobId) -> JobResult<()> {
        let running = self.running.lock().await;
        let entry = running.get(&id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        entry.handle.resume();
        self.db.set_status(id, JobStatus::Running, Utc::now()).await
    }

    pub async fn cancel(&self, id: JobId) -> JobResult<()> {
        let running = self.running.lock().await;
        if let Some(entry) = running.get(&id) {
            entry.handle.cancel();
            return Ok(());
        }
        drop(running);
        // Not currently running: it's pending/queued, cancel it directly.
        self.db.set_status(id, JobStatus::Cancelled, Utc::now()).await
    }

    pub async fn stats(&self) -> JobResult<QueueStats> {
        let active = self.db.list_active().await?;
        let running = active.iter().filter(|j| j.status == JobStatus::Running).count();
        let pending = active.iter().filter(|j| j.status == JobStatus::Pending).count();
        let queued = active.iter().filter(|j| j.status == JobStatus::Queued).count();
        let paused = active.iter().filter(|j| j.status == JobStatus::Paused).count();
        let failed = self.db.count_by_status(JobStatus::Failed).await?;
        let completed = self.db.count_by_status(JobStatus::Completed).await?;
        let available_slots = self.config.max_concurrent.saturating_sub(running);
        Ok(QueueStats {
            running,
            queued,
            pending,
            paused,
            failed,
            completed,
            available_slots,
            max_concurrent: self.config.max_concurrent,
        })
    }

    /// Called by the dispatched job's wrapper task once it finishes, to free
    /// its running slot. Wakes the dispatcher to fill the freed slot.
    pub(crate) async fn mark_finished(&self, id: JobId) {
        self.running.lock().await.remove(&id);
        self.notify.notify_waiters();
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub running: usize,
    pub queued: usize,
    pub pending: usize,
    pub paused: usize,
    pub failed: usize,
    pub completed: usize,
    pub available_slots: usize,
    pub max_concurrent: usize,
}
