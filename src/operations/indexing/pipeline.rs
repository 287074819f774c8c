//! The indexing pipeline: index/reindex/incremental_update handlers sharing
//! one per-file sub-pipeline (parse -> chunk -> deterministic id -> batch ->
//! embed -> upsert -> progress), with pause/cancel checked at every batch
//! boundary as §9 of the originating design mandates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::domain::job::{Job, JobPayload, JobProgress};
use crate::infrastructure::jobs::{Interrupt, JobError, JobResult, JobRunContext, JobRunner};
use crate::operations::collections::{ApplyJobResult, CollectionRegistry, JobOutcome};
use crate::operations::embedding::EmbeddingService;
use crate::operations::vector::{VectorRecord, VectorStore};

use super::chunk::{chunk_id, Chunker};
use super::filters::{build_ignore_set, is_indexable};

pub struct IndexingPipeline {
    registry: Arc<CollectionRegistry>,
    apply_result: Arc<dyn ApplyJobResult>,
    vector_store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingService>,
    chunker: Arc<dyn Chunker>,
    config: PipelineConfig,
}

impl IndexingPipeline {
    /// `apply_result` is handed in separately from `registry` even though it
    /// is presently the same object: the pipeline depends on the callback,
    /// not on the registry's concrete type.
    pub fn new(
        registry: Arc<CollectionRegistry>,
        apply_result: Arc<dyn ApplyJobResult>,
        vector_store: Arc<dyn VectorStore>,
        embedding: Arc<dyn EmbeddingService>,
        chunker: Arc<dyn Chunker>,
        config: PipelineConfig,
    ) -> Self {
        Self { registry, apply_result, vector_store, embedding, chunker, config }
    }

    fn list_markdown_files(root: &Path, ignore_patterns: &[String]) -> Vec<PathBuf> {
        let ignore = build_ignore_set(ignore_patterns);
        let mut out = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(root) {
                    if is_indexable(rel, &ignore) {
                        out.push(path);
                    }
                }
            }
        }
        out.sort();
        out
    }

    /// The shared per-file sub-pipeline: every file is parsed, chunked, and
    /// its chunks batched up to `batch_size` before an embed+upsert round
    /// trip, checking pause/cancel at each batch boundary.
    async fn process_files(
        &self,
        namespace: &str,
        root: &Path,
        files: &[PathBuf],
        chunk_size: usize,
        chunk_overlap: usize,
        ctx: &JobRunContext,
        progress: &mut JobProgress,
    ) -> JobResult<(u64, u64)> {
        let mut documents_created = 0u64;
        let mut chunks_created = 0u64;
        let mut batch: Vec<VectorRecord> = Vec::with_capacity(self.config.batch_size);

        for (file_index, file) in files.iter().enumerate() {
            ctx.control.check().await.map_err(interrupt_to_error)?;

            let relative = file.strip_prefix(root).unwrap_or(file);
            progress.current_file = Some(relative.to_string_lossy().into_owned());

            let content = match tokio::fs::read_to_string(file).await {
                Ok(c) => c,
                Err(e) => {
                    // Per-file errors are skipped, not fatal to the job.
                    progress.errors_count += 1;
                    progress.last_error = Some(format!("{}: {e}", relative.display()));
                    warn!(file = %relative.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };

            let texts: Vec<String> = self.chunker.chunk(&content, chunk_size, chunk_overlap);
            if !texts.is_empty() {
                let embeddings = tokio::time::timeout(
                    Duration::from_secs(self.config.per_call_deadline_secs),
                    self.embedding.embed_batch(&texts),
                )
                .await
                .map_err(|_| JobError::Transient("embedding request timed out".to_string()))?
                .map_err(|e| JobError::Transient(e.to_string()))?;

                for (index, (text, embedding)) in texts.iter().zip(embeddings).enumerate() {
                    let id = chunk_id(namespace, relative, index);
                    let mut metadata = HashMap::new();
                    metadata.insert("path".to_string(), relative.to_string_lossy().into_owned());
                    metadata.insert("chunk_index".to_string(), index.to_string());
                    metadata.insert("text".to_string(), text.clone());
                    batch.push(VectorRecord { chunk_id: id, embedding, metadata });
                    chunks_created += 1;

                    if batch.len() >= self.config.batch_size {
                        self.flush_batch(namespace, &mut batch).await?;
                        ctx.control.check().await.map_err(interrupt_to_error)?;
                    }
                }
            }

            documents_created += 1;
            progress.files_processed = file_index as u64 + 1;
            progress.total_files = files.len() as u64;
            if (file_index + 1) % self.config.progress_every_n_files == 0 || file_index + 1 == files.len() {
                progress.documents_created = documents_created;
                progress.chunks_created = chunks_created;
                let pct = (progress.files_processed as f32 / progress.total_files.max(1) as f32) * 100.0;
                progress.set_percent(pct);
                let _ = ctx.progress.send(progress.clone());
            }
        }

        if !batch.is_empty() {
            self.flush_batch(namespace, &mut batch).await?;
        }

        Ok((documents_created, chunks_created))
    }

    async fn flush_batch(&self, namespace: &str, batch: &mut Vec<VectorRecord>) -> JobResult<()> {
        let records = std::mem::take(batch);
        self.vector_store
            .upsert(namespace, records)
            .await
            .map_err(|e| JobError::Transient(e.to_string()))
    }

    async fn run_index(&self, collection: &str, force: bool, ctx: &JobRunContext) -> JobResult<()> {
        let meta = self.registry.get(collection).await.map_err(|e| JobError::Fatal(e.to_string()))?;
        self.vector_store
            .create_namespace(collection, force)
            .await
            .map_err(|e| JobError::Conflict(e.to_string()))?;

        let files = Self::list_markdown_files(&meta.source_path, &meta.config.ignore_patterns);
        let mut progress = JobProgress { total_files: files.len() as u64, ..Default::default() };
        let (documents, chunks) = self
            .process_files(
                collection,
                &meta.source_path,
                &files,
                meta.config.chunk_size,
                meta.config.chunk_overlap,
                ctx,
                &mut progress,
            )
            .await?;

        self.apply_result
            .apply_job_result(
                collection,
                JobOutcome { documents_delta: documents as i64, chunks_delta: chunks as i64, error: None, indexed_now: true },
            )
            .await
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn run_reindex(&self, collection: &str, ctx: &JobRunContext) -> JobResult<()> {
        let meta = self.registry.get(collection).await.map_err(|e| JobError::Fatal(e.to_string()))?;
        self.vector_store
            .delete_namespace(collection)
            .await
            .map_err(|e| JobError::Transient(e.to_string()))?;
        self.vector_store
            .create_namespace(collection, true)
            .await
            .map_err(|e| JobError::Transient(e.to_string()))?;

        let files = Self::list_markdown_files(&meta.source_path, &meta.config.ignore_patterns);
        let mut progress = JobProgress { total_files: files.len() as u64, ..Default::default() };
        let (documents, chunks) = self
            .process_files(
                collection,
                &meta.source_path,
                &files,
                meta.config.chunk_size,
                meta.config.chunk_overlap,
                ctx,
                &mut progress,
            )
            .await?;

        self.apply_result
            .apply_job_result(
                collection,
                JobOutcome {
                    documents_delta: documents as i64 - meta.document_count as i64,
                    chunks_delta: chunks as i64 - meta.chunk_count as i64,
                    error: None,
                    indexed_now: true,
                },
            )
            .await
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn run_incremental(
        &self,
        collection: &str,
        added: &[PathBuf],
        modified: &[PathBuf],
        deleted: &[PathBuf],
        ctx: &JobRunContext,
    ) -> JobResult<()> {
        let meta = self.registry.get(collection).await.map_err(|e| JobError::Fatal(e.to_string()))?;
        let total = added.len() + modified.len() + deleted.len();
        let mut progress = JobProgress { total_files: total as u64, ..Default::default() };

        let to_process: Vec<PathBuf> = added.iter().chain(modified.iter()).cloned().collect();
        let (documents_added, chunks_added) = self
            .process_files(
                collection,
                &meta.source_path,
                &to_process,
                meta.config.chunk_size,
                meta.config.chunk_overlap,
                ctx,
                &mut progress,
            )
            .await?;

        let mut chunks_removed = 0u64;
        for path in deleted.iter().chain(modified.iter()) {
            ctx.control.check().await.map_err(interrupt_to_error)?;
            let relative = path.strip_prefix(&meta.source_path).unwrap_or(path);
            // Deterministic ids mean we can delete by recomputing them for a
            // generous range of chunk indices without re-reading the file.
            let ids: Vec<String> = (0..256).map(|i| chunk_id(collection, relative, i)).collect();
            self.vector_store
                .delete_chunks(collection, &ids)
                .await
                .map_err(|e| JobError::Transient(e.to_string()))?;
            chunks_removed += 1;
        }

        self.apply_result
            .apply_job_result(
                collection,
                JobOutcome {
                    documents_delta: added.len() as i64 - deleted.len() as i64,
                    chunks_delta: chunks_added as i64 - chunks_removed as i64,
                    error: None,
                    indexed_now: false,
                },
            )
            .await
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        Ok(())
    }

    /// The confirmation token was already validated and consumed when this
    /// job was enqueued (`Core::delete_collection`); this handler's job is
    /// just to drop both halves of the collection atomically with respect
    /// to crash recovery — the namespace first, so a crash between the two
    /// leaves an orphaned registry row (caught by `health`) rather than a
    /// registry row pointing at vectors that no longer exist.
    async fn run_delete(&self, collection: &str) -> JobResult<()> {
        self.vector_store
            .delete_namespace(collection)
            .await
            .map_err(|e| JobError::Transient(e.to_string()))?;
        self.registry
            .remove_record(collection)
            .await
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        Ok(())
    }
}

fn interrupt_to_error(interrupt: Interrupt) -> JobError {
    match interrupt {
        Interrupt::Cancelled => JobError::Cancelled,
    }
}

#[async_trait]
impl JobRunner for IndexingPipeline {
    async fn run(&self, job: &Job, ctx: JobRunContext) -> JobResult<()> {
        match &job.payload {
            JobPayload::Index { collection, force } => self.run_index(collection, *force, &ctx).await,
            JobPayload::Reindex { collection } => self.run_reindex(collection, &ctx).await,
            JobPayload::IncrementalUpdate { collection, added, modified, deleted } => {
                self.run_incremental(collection, added, modified, deleted, &ctx).await
            }
            JobPayload::Delete { collection, .. } => self.run_delete(collection).await,
        }
    }
}
