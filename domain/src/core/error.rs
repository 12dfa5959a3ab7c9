//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Clustering failed: {0}")]
    ClusteringFailed(String),

    #[error("Invalid embeddings: {0}")]
    InvalidEmbeddings(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl DomainError {
    /// Check if this error came out of the grouping algorithm itself
    pub fn is_clustering_failure(&self) -> bool {
        matches!(
            self,
            DomainError::ClusteringFailed(_) | DomainError::InvalidEmbeddings(_)
        )
    }
}
