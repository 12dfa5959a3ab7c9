//! Model and embedding provider adapters

pub mod openai;

pub use openai::{ChatSettings, OpenAiEmbeddingService, OpenAiGateway};
