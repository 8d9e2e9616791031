//! Embedding provider trait and the batching client used by the pipelines

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// `embed_batch` must preserve input order. The default implementation calls
/// `embed` sequentially; providers with native batch endpoints should
/// override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Embedding dimensions
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Batching wrapper over an [`EmbeddingProvider`]
///
/// Splits large inputs into fixed-size provider calls while preserving input
/// order across batches. Any batch failure fails the whole call; there is no
/// partial-success repair.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed every text, returning vectors in input order
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch_vectors = self.provider.embed_batch(batch).await?;
            if batch_vectors.len() != batch.len() {
                return Err(Error::dependency(
                    self.provider.name(),
                    format!(
                        "provider returned {} vectors for a batch of {}",
                        batch_vectors.len(),
                        batch.len()
                    ),
                ));
            }
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }

    /// Embed a single text (used for questions)
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.provider.embed(text).await
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }
}
