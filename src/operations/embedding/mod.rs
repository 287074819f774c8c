//! The embedding service boundary. `HashingEmbeddingService` is a
//! deterministic stand-in (no network call, no model weights) used so the
//! pipeline and query path can be exercised without a real provider.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("embedding request timed out")]
    Timeout,
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic bag-of-words hashing embedding: every token's blake3 hash
/// bucket gets incremented, then the vector is L2-normalized. Stands in for
/// an external embedding provider in tests and local runs.
pub struct HashingEmbeddingService {
    dimensions: usize,
}

impl HashingEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashingEmbeddingService {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingService for HashingEmbeddingService {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut vector = vec![0f32; self.dimensions];
        for token in text.split_whitespace() {
            let hash = blake3::hash(token.as_bytes());
            let bucket = (u32::from_le_bytes(hash.as_bytes()[0..4].try_into().unwrap()) as usize) % self.dimensions;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalized() {
        let service = HashingEmbeddingService::new(64);
        let a = service.embed("hello world").await.unwrap();
        let b = service.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }
}
