use super::Embedder;
use crate::error::{MemoryError, MemoryResult};
use async_trait::async_trait;
use tracing::{debug, instrument};

pub const EMBEDDING_DIM: usize = 384;

/// Deterministic byte-histogram pseudo-embedding. Stands in for a real
/// sentence-transformer encoder: same dimensionality and normalization
/// contract, no model weights to load.
#[derive(Debug, Clone, Default)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    #[instrument(skip(self), fields(query_len = query.len()))]
    async fn embed(&self, query: &str) -> MemoryResult<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(MemoryError::Invalid("empty query for embedding".to_string()));
        }

        let mut embedding = vec![0.0f32; EMBEDDING_DIM];
        for (i, &byte) in query.as_bytes().iter().enumerate() {
            let idx = i % EMBEDDING_DIM;
            embedding[idx] += (byte as f32) / 255.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        debug!("generated {}-dim embedding", embedding.len());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> MemoryResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_returns_unit_vector_of_expected_dimension() {
        let embedder = HashEmbedder::new();
        let vector = embedder.embed("remember the milk").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIM);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embed_is_deterministic() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_rejects_empty_query() {
        let embedder = HashEmbedder::new();
        assert!(embedder.embed("   ").await.is_err());
    }
}
