//! Domain layer for sensemaker
//!
//! This crate contains the core analysis logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Clustering
//!
//! Embedded responses are grouped by [`AdaptiveClusterer`], which picks the
//! number of groups from the knee of the k-means distortion curve.
//!
//! ## Consolidation
//!
//! Each cluster is condensed by a language model into [`SemanticBucket`]s.
//! The model's answer is untrusted: [`reconcile`] filters invented ids and
//! recovers forgotten ones so every response is accounted for exactly once.
//!
//! ## Consensus
//!
//! Feedback votes on the resulting statements roll up into
//! [`ConsensusMetrics`] and per-statement [`StatementAgreement`]s.
//!
//! ## Jobs
//!
//! An [`AnalysisJob`] is claimed by one worker at a time; the lock
//! timestamp is the ownership token for the terminal write.

pub mod analysis;
pub mod clustering;
pub mod config;
pub mod consensus;
pub mod consolidation;
pub mod core;
pub mod job;
pub mod prompt;
pub mod response;

// Re-export commonly used types
pub use analysis::{AnalysisPhase, AnalysisReport, ClusteringSummary};
pub use clustering::{
    AdaptiveClusterer, ClusterSummary, ClusteringOutcome, DEFAULT_IQR_THRESHOLD, KSelection,
    Point2D, filter_outliers, summarize,
};
pub use config::{AnalysisConfig, ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use consensus::{
    ConsensusMetrics, FeedbackValue, FeedbackVote, StatementAgreement, agreement_for_buckets,
    agreement_for_responses, compute_consensus, resolve_to_representatives,
};
pub use consolidation::{
    ConsolidationParseError, ConsolidationResult, SemanticBucket, ValidationReport,
    parse_consolidation_response, reconcile,
};
pub use core::{error::DomainError, model::Model};
pub use job::{AnalysisJob, AnalysisStrategy, JobStatus, reclaim_cutoff};
pub use prompt::PromptTemplate;
pub use response::{ConversationId, Embedding, Response, ResponseId};
