//! OpenAI-compatible HTTP adapters
//!
//! [`OpenAiGateway`] implements the consolidation model port over
//! `/chat/completions`; [`OpenAiEmbeddingService`] implements the embedding
//! port over `/embeddings`. Any server exposing the same API works.

mod client;
mod embeddings;
mod gateway;
mod types;

pub use client::{HttpError, OpenAiClient};
pub use embeddings::OpenAiEmbeddingService;
pub use gateway::{ChatSettings, OpenAiGateway, OpenAiSession};
