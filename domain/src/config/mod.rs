//! Configuration value objects for the domain layer
//!
//! These are domain concepts related to configuration that are
//! used across multiple layers.

mod analysis_config;
mod output_format;
pub mod validation;

pub use analysis_config::{
    AnalysisConfig, DEFAULT_LOCK_TTL_MS, DEFAULT_MAX_RESPONSES_PER_CALL, default_min_cluster_size,
};
pub use output_format::OutputFormat;
pub use validation::{ConfigIssue, ConfigIssueCode, Severity};
