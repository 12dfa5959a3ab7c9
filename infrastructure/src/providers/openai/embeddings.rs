//! Embedding service backed by the `/embeddings` endpoint

use super::client::OpenAiClient;
use super::types::{EmbeddingRequest, EmbeddingResponse};
use async_trait::async_trait;
use sensemaker_application::{EmbeddingError, EmbeddingService};
use sensemaker_domain::Embedding;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiEmbeddingService {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddingService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        batch_size: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, EmbeddingError> {
        let client = OpenAiClient::new(base_url, api_key, timeout)?;
        Ok(Self {
            client,
            model: model.into(),
            batch_size: batch_size.max(1),
        })
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingService {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(model = %self.model, count = texts.len(), "Requesting embeddings");
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response: EmbeddingResponse = self.client.post_json("embeddings", &request).await?;
        response.into_vectors(texts.len())
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}
