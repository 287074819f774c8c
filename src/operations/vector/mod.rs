//! The vector store boundary. A real deployment points this at an external
//! service; `InMemoryVectorStore` is a deterministic reference
//! implementation used by the pipeline's and query path's own tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("namespace already exists: {0}")]
    NamespaceConflict(String),

    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("vector store unavailable: {0}")]
    Unavailable(String),
}

pub type VectorResult<T> = Result<T, VectorStoreError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub chunk_id: String,
    pub distance: f32,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_namespace(&self, namespace: &str, force: bool) -> VectorResult<()>;
    async fn delete_namespace(&self, namespace: &str) -> VectorResult<()>;
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> VectorResult<()>;
    async fn delete_chunks(&self, namespace: &str, chunk_ids: &[String]) -> VectorResult<()>;
    /// Returns up to `limit` nearest matches by cosine distance.
    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        limit: usize,
        filters: &HashMap<String, String>,
    ) -> VectorResult<Vec<VectorMatch>>;
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (norm_a * norm_b))
}

#[derive(Default)]
struct Namespace {
    records: HashMap<String, VectorRecord>,
}

/// In-memory deterministic vector store: linear-scan cosine distance, no
/// persistence. Stands in for the external vector store that production
/// deployments provide.
#[derive(Default)]
pub struct InMemoryVectorStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_namespace(&self, namespace: &str, force: bool) -> VectorResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(namespace) && !force {
            return Err(VectorStoreError::NamespaceConflict(namespace.to_string()));
        }
        namespaces.insert(namespace.to_string(), Namespace::default());
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> VectorResult<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> VectorResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| VectorStoreError::NamespaceNotFound(namespace.to_string()))?;
        for record in records {
            ns.records.insert(record.chunk_id.clone(), record);
        }
        Ok(())
    }

    async fn delete_chunks(&self, namespace: &str, chunk_ids: &[String]) -> VectorResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(ns) = namespaces.get_mut(namespace) {
            for id in chunk_ids {
                ns.records.remove(id);
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        embedding: &[f32],
        limit: usize,
        filters: &HashMap<String, String>,
    ) -> VectorResult<Vec<VectorMatch>> {
        let namespaces = self.namespaces.read().await;
        let ns = namespaces
            .get(namespace)
            .ok_or_else(|| VectorStoreError::NamespaceNotFound(namespace.to_string()))?;

        let mut matches: Vec<VectorMatch> = ns
            .records
            .values()
            .filter(|r| filters.iter().all(|(k, v)| r.metadata.get(k) == Some(v)))
            .map(|r| VectorMatch {
                chunk_id: r.chunk_id.clone(),
                distance: cosine_distance(embedding, &r.embedding),
                metadata: r.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_respects_limit_and_filters() {
        let store = InMemoryVectorStore::new();
        store.create_namespace("demo", false).await.unwrap();
        store
            .upsert(
                "demo",
                vec![
                    VectorRecord { chunk_id: "a".into(), embedding: vec![1.0, 0.0], metadata: HashMap::from([("path".into(), "a.md".into())]) },
                    VectorRecord { chunk_id: "b".into(), embedding: vec![0.0, 1.0], metadata: HashMap::from([("path".into(), "b.md".into())]) },
                ],
            )
            .await
            .unwrap();

        let matches = store.query("demo", &[1.0, 0.0], 1, &HashMap::new()).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].chunk_id, "a");

        let filtered = store
            .query("demo", &[1.0, 0.0], 10, &HashMap::from([("path".to_string(), "b.md".to_string())]))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk_id, "b");
    }
}
