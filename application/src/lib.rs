//! Application layer for sensemaker
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::BehaviorConfig;
pub use ports::{
    embedding::{EmbeddingError, EmbeddingService, embed_all},
    event_logger::{AnalysisEvent, AnalysisEventLogger, NoAnalysisLogger},
    llm_gateway::{GatewayError, LlmGateway, LlmSession},
    progress::{AnalysisProgressNotifier, NoProgress},
    repository::{ConversationRepository, JobOutcome, JobRepository, RepositoryError},
};
pub use use_cases::analysis_queue::{AnalysisQueue, AnalysisTicket, RunStatus};
pub use use_cases::consolidate_clusters::{ConsolidateClustersUseCase, ConsolidationError};
pub use use_cases::run_analysis::{
    Clock, RunAnalysisError, RunAnalysisOutcome, RunAnalysisUseCase,
};
