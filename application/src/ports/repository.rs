//! Store ports
//!
//! The exclusivity rules of analysis jobs depend on three kinds of store
//! operation: an atomic conditional claim, a status read, and terminal
//! writes guarded by the claim token. Everything else is plain row I/O.

use async_trait::async_trait;
use sensemaker_domain::{AnalysisJob, AnalysisReport, ConversationId, FeedbackVote, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Final state a worker wants to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new `queued` job.
    async fn create_job(&self, job: &AnalysisJob) -> Result<(), RepositoryError>;

    /// Atomically move the job to `running` if it is `queued`, or `running`
    /// with a lock older than `lock_ttl_ms`.
    ///
    /// Returns the claim token (`locked_at`) on success, `None` when another
    /// worker holds the job or it is already finished. Must be a single
    /// conditional update; a read followed by a write would race.
    async fn claim(
        &self,
        job_id: &str,
        now_ms: i64,
        lock_ttl_ms: u64,
    ) -> Result<Option<i64>, RepositoryError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError>;

    /// Write a terminal status only if the job is still `running` under
    /// `token`. Returns `false` when the job was superseded.
    async fn finish(
        &self,
        job_id: &str,
        token: i64,
        outcome: &JobOutcome,
    ) -> Result<bool, RepositoryError>;

    /// Mark the job succeeded and persist `report` in one transaction.
    ///
    /// The status update carries the same guard as [`finish`](Self::finish);
    /// when it matches no row, nothing is written and `false` is returned.
    /// Replaces the conversation's statements with those of `report`.
    async fn complete(
        &self,
        job_id: &str,
        token: i64,
        report: &AnalysisReport,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn responses(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Response>, RepositoryError>;

    async fn feedback(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<FeedbackVote>, RepositoryError>;

    /// Set or clear the human-readable error shown on the conversation.
    async fn set_conversation_error(
        &self,
        conversation_id: &ConversationId,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;
}
