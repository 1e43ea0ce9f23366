use async_trait::async_trait;

use crate::error::VectorResult;

/// Turns text into embedding vectors
///
/// Implementations call out to an embedding service; the repository only
/// relies on the output order matching the input order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>>;

    /// Embed several texts with one request
    async fn embed_batch(&self, texts: &[String]) -> VectorResult<Vec<Vec<f32>>>;
}
