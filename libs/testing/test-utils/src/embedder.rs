use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use domain_vector_repository::{EmbeddingProvider, VectorResult};

/// Deterministic bag-of-words embedder
///
/// Each lowercase word is hashed into one of `dimension` buckets, so texts
/// sharing words land close together under cosine similarity. Counts every
/// request so tests can assert when no embedding call was made.
#[derive(Debug)]
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of `embed`/`embed_batch` requests served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }

        // Keep empty texts away from the zero vector
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> VectorResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> VectorResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_vector() {
        let embedder = HashEmbedder::new(16);
        assert_eq!(embedder.vector_for("I like soccer."), embedder.vector_for("i LIKE soccer"));
        assert_eq!(embedder.vector_for("anything").len(), 16);
    }

    #[test]
    fn test_empty_text_is_not_zero() {
        let embedder = HashEmbedder::new(8);
        assert_eq!(embedder.vector_for("")[0], 1.0);
    }

    #[tokio::test]
    async fn test_counts_requests() {
        let embedder = HashEmbedder::new(8);
        embedder.embed("a").await.unwrap();
        let batch = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(embedder.calls(), 2);
    }
}
