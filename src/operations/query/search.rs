//! The query path: embed -> vector store query -> similarity filter -> sort
//! -> truncate -> optional adjacent-chunk context. Read-only: this module
//! never touches the job queue or the registry's write path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::operations::collections::{CollectionRegistry, RegistryError};
use crate::operations::embedding::{EmbeddingError, EmbeddingService};
use crate::operations::vector::{VectorStore, VectorStoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Vector(#[from] VectorStoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub path: String,
    pub similarity: f32,
    pub text: String,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultInfo {
    pub collection: String,
    pub document_count: u64,
    pub chunk_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub search_time_ms: u64,
    pub vault_info: VaultInfo,
}

pub struct QueryService {
    registry: Arc<CollectionRegistry>,
    vector_store: Arc<dyn VectorStore>,
    embedding: Arc<dyn EmbeddingService>,
}

impl QueryService {
    pub fn new(registry: Arc<CollectionRegistry>, vector_store: Arc<dyn VectorStore>, embedding: Arc<dyn EmbeddingService>) -> Self {
        Self { registry, vector_store, embedding }
    }

    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        threshold: f32,
        filters: HashMap<String, String>,
        attach_context: bool,
    ) -> QueryResult<SearchResponse> {
        let started = Instant::now();
        let meta = self.registry.get(collection).await?;

        let embedding = self.embedding.embed(query).await?;
        let candidate_limit = (limit * 2).min(100).max(limit);
        let matches = self.vector_store.query(collection, &embedding, candidate_limit, &filters).await?;

        let mut results: Vec<SearchResult> = matches
            .into_iter()
            .map(|m| {
                let similarity = (1.0 - m.distance).clamp(0.0, 1.0);
                SearchResult {
                    chunk_id: m.chunk_id,
                    path: m.metadata.get("path").cloned().unwrap_or_default(),
                    similarity,
                    text: m.metadata.get("text").cloned().unwrap_or_default(),
                    context_before: None,
                    context_after: None,
                }
            })
            .filter(|r| r.similarity >= threshold)
            .collect();

        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        let total_found = results.len();
        results.truncate(limit);

        if attach_context {
            self.attach_adjacent_context(&mut results);
        }

        Ok(SearchResponse {
            results,
            total_found,
            search_time_ms: started.elapsed().as_millis() as u64,
            vault_info: VaultInfo {
                collection: meta.name,
                document_count: meta.document_count,
                chunk_count: meta.chunk_count,
            },
        })
    }

    /// Hook for pulling in the previous/next chunk's text by (path,
    /// chunk_index); the in-memory reference store has no neighbor lookup.
    fn attach_adjacent_context(&self, results: &mut [SearchResult]) {
        for result in results.iter_mut() {
            result.context_before = None;
            result.context_after = None;
        }
    }
}
