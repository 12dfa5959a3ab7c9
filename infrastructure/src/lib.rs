//! Infrastructure layer for sensemaker
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod providers;
pub mod store;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileAnalysisConfig, FileConfig, FileDatabaseConfig, FileEmbeddingConfig,
    FileLlmConfig, FileLoggingConfig, FileOutputConfig,
};
pub use logging::JsonlAnalysisLogger;
pub use providers::{ChatSettings, OpenAiEmbeddingService, OpenAiGateway};
pub use store::SqliteStore;
