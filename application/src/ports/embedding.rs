//! Embedding service port
//!
//! Turns response texts into vectors. The service is a black box: the
//! clusterer only requires one vector per text, all of the same length.

use async_trait::async_trait;
use sensemaker_domain::Embedding;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),

    #[error("Embedding service returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed one batch of texts, preserving order.
    ///
    /// A failure aborts the whole batch; there is no partial result.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError>;

    /// Largest batch the service accepts in one call.
    fn max_batch_size(&self) -> usize {
        64
    }
}

/// Embed any number of texts in consecutive batches.
pub async fn embed_all(
    service: &dyn EmbeddingService,
    texts: &[String],
) -> Result<Vec<Embedding>, EmbeddingError> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(service.max_batch_size().max(1)) {
        let vectors = service.embed(batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: batch.len(),
                got: vectors.len(),
            });
        }
        out.extend(vectors);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingEmbedder {
        batch: usize,
        calls: Mutex<Vec<usize>>,
        short_by: usize,
    }

    #[async_trait]
    impl EmbeddingService for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
            self.calls.lock().unwrap().push(texts.len());
            let n = texts.len().saturating_sub(self.short_by);
            Ok((0..n).map(|i| vec![i as f32, 1.0]).collect())
        }

        fn max_batch_size(&self) -> usize {
            self.batch
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn test_embed_all_batches_in_order() {
        let service = CountingEmbedder {
            batch: 4,
            calls: Mutex::new(Vec::new()),
            short_by: 0,
        };

        let vectors = embed_all(&service, &texts(10)).await.unwrap();
        assert_eq!(vectors.len(), 10);
        assert_eq!(*service.calls.lock().unwrap(), vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_short_batch_is_an_error() {
        let service = CountingEmbedder {
            batch: 8,
            calls: Mutex::new(Vec::new()),
            short_by: 1,
        };

        let err = embed_all(&service, &texts(3)).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CountMismatch {
                expected: 3,
                got: 2
            }
        ));
    }
}
