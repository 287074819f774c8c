//! vaultdex: a control plane for semantically-indexed Markdown collections.
//!
//! `Core` wires together the collection registry, the job queue, the
//! indexing pipeline, the query path, and the filesystem watcher into one
//! process.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod operations;
pub mod services;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::job::{JobKind, JobPayload, JobPriority};
use crate::infrastructure::database::{open_collections_db, open_jobs_db};
use crate::infrastructure::events::EventBus;
use crate::infrastructure::jobs::{JobDb, JobQueue};
use crate::operations::collections::CollectionRegistry;
use crate::operations::embedding::HashingEmbeddingService;
use crate::operations::indexing::chunk::ParagraphChunker;
use crate::operations::indexing::IndexingPipeline;
use crate::operations::query::QueryService;
use crate::operations::vector::InMemoryVectorStore;
use crate::services::ChangeWatcher;

/// The wired-up application: every collaborator a CLI or API layer needs,
/// already constructed and already running its background tasks.
pub struct Core {
    pub config: AppConfig,
    pub events: Arc<EventBus>,
    pub registry: Arc<CollectionRegistry>,
    pub queue: Arc<JobQueue>,
    pub query: Arc<QueryService>,
    pub watcher: Arc<ChangeWatcher>,
}

impl Core {
    /// Initialize with the platform default data directory.
    pub async fn new() -> anyhow::Result<Self> {
        let data_dir = crate::config::default_data_dir()?;
        Self::new_with_data_dir(data_dir).await
    }

    /// Initialize with a caller-chosen data directory (tests, `--data-dir`).
    pub async fn new_with_data_dir(data_dir: PathBuf) -> anyhow::Result<Self> {
        info!("initializing vaultdex at {:?}", data_dir);

        // 1. Load or create app config.
        let config = AppConfig::load_or_create(&data_dir)?;
        config.ensure_directories()?;

        // 2. Open both databases and run their migrations.
        let collections_conn = open_collections_db(&config.collections_db_path()).await?;
        let jobs_conn = open_jobs_db(&config.jobs_db_path()).await?;

        // 3. Event bus.
        let events = EventBus::new(config.events.subscriber_buffer);

        // 4. Collection registry.
        let registry = Arc::new(CollectionRegistry::new(collections_conn));

        // 5. Vector store, embedding service, chunker: deterministic
        // in-process reference implementations.
        let vector_store: Arc<dyn crate::operations::vector::VectorStore> = Arc::new(InMemoryVectorStore::new());
        let embedding: Arc<dyn crate::operations::embedding::EmbeddingService> =
            Arc::new(HashingEmbeddingService::default());
        let chunker: Arc<dyn crate::operations::indexing::chunk::Chunker> = Arc::new(ParagraphChunker::default());

        // 6. Indexing pipeline, with the registry handed in as the
        // job-result callback rather than a concrete dependency.
        let pipeline = Arc::new(IndexingPipeline::new(
            registry.clone(),
            registry.clone() as Arc<dyn crate::operations::collections::ApplyJobResult>,
            vector_store.clone(),
            embedding.clone(),
            chunker,
            config.pipeline.clone(),
        ));

        // 7. Job queue, demoting any job left `running` by a prior crash.
        let job_db = Arc::new(JobDb::new(jobs_conn));
        let queue = JobQueue::new(
            job_db,
            config.queue.clone(),
            pipeline,
            events.clone(),
            registry.clone() as Arc<dyn crate::operations::collections::ApplyJobResult>,
        )
        .await?;
        queue.spawn_dispatcher();

        // 8. Query path.
        let query = Arc::new(QueryService::new(registry.clone(), vector_store, embedding));

        // 9. Filesystem watcher, re-armed for every collection already on
        // record (process restart recovery).
        let watcher = ChangeWatcher::new(registry.clone(), queue.clone(), config.watcher_state_dir());
        rearm_watcher(&watcher, &registry, &config).await;

        info!("vaultdex ready");
        Ok(Self { config, events, registry, queue, query, watcher })
    }

    /// Create a collection and enqueue its initial `index` job.
    pub async fn create_collection(
        &self,
        name: String,
        source_path: PathBuf,
        cfg: crate::domain::collection::CollectionConfig,
    ) -> anyhow::Result<()> {
        let collection = self.registry.create(name.clone(), source_path.clone(), cfg.clone()).await?;
        self.watcher
            .add(&collection.name, source_path, cfg.debounce_ms, cfg.scan_interval_s, &cfg.ignore_patterns)
            .await?;
        self.queue
            .create(JobPayload::Index { collection: name, force: false }, JobPriority::NORMAL)
            .await?;
        Ok(())
    }

    /// Update a collection's config, enqueueing whatever follow-up job the
    /// change implies. A `config_update_job` of `IncrementalUpdate` is
    /// conservatively upgraded to a full `reindex`: the registry has no way
    /// to know which files now match a changed ignore pattern without
    /// re-walking the vault, and the pipeline already does that for reindex.
    pub async fn update_collection_config(
        &self,
        name: &str,
        new_config: crate::domain::collection::CollectionConfig,
    ) -> anyhow::Result<()> {
        let follow_up = self.registry.update_config(name, new_config.clone()).await?;
        self.watcher.update(name, new_config.debounce_ms, &new_config.ignore_patterns).await.ok();
        if let Some(kind) = follow_up {
            let payload = match kind {
                JobKind::Index => JobPayload::Index { collection: name.to_string(), force: true },
                _ => JobPayload::Reindex { collection: name.to_string() },
            };
            self.queue.create(payload, JobPriority::NORMAL).await?;
        }
        Ok(())
    }

    /// Validate and consume the deletion confirmation token, then enqueue
    /// the `delete` job that actually drops the vector namespace and the
    /// registry row. The registry itself never deletes a collection
    /// directly — only the job handler does, so a crash mid-deletion is
    /// recovered the same way any other job crash is.
    pub async fn delete_collection(
        &self,
        name: &str,
        confirmation_token: &str,
    ) -> anyhow::Result<crate::domain::job::JobId> {
        self.registry.validate_deletion_token(name, confirmation_token).await?;
        self.watcher.remove(name).await.ok();
        let id = self
            .queue
            .create(
                JobPayload::Delete { collection: name.to_string(), confirmation_token: confirmation_token.to_string() },
                JobPriority::HIGH,
            )
            .await?;
        Ok(id)
    }
}

async fn rearm_watcher(watcher: &Arc<ChangeWatcher>, registry: &Arc<CollectionRegistry>, config: &AppConfig) {
    let (collections, _) = match registry.list(0, 10_000).await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "could not list collections for watcher re-arm");
            return;
        }
    };
    for collection in collections {
        if let Err(e) = watcher
            .add(
                &collection.name,
                collection.source_path.clone(),
                collection.config.debounce_ms,
                collection.config.scan_interval_s,
                &collection.config.ignore_patterns,
            )
            .await
        {
            error!(collection = %collection.name, error = %e, "failed to re-arm watcher");
        }
    }
    let _ = config;
}
