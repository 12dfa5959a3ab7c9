//! Analysis job state machine
//!
//! ```text
//! queued ──claim──▶ running ──▶ succeeded
//!                     │   ▲
//!                     │   └── reclaim once locked_at is older than the TTL
//!                     └──────▶ failed
//! ```

use crate::core::error::DomainError;
use crate::response::ConversationId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::InvalidConfig(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// How much of a conversation to re-analyse.
///
/// Both strategies currently recompute from scratch; `Incremental` is
/// recorded so callers can tell a scheduled refresh from a manual rerun.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStrategy {
    Incremental,
    #[default]
    Full,
}

impl AnalysisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStrategy::Incremental => "incremental",
            AnalysisStrategy::Full => "full",
        }
    }
}

impl std::fmt::Display for AnalysisStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "incremental" => Ok(AnalysisStrategy::Incremental),
            "full" => Ok(AnalysisStrategy::Full),
            other => Err(DomainError::InvalidConfig(format!(
                "unknown analysis strategy: {}",
                other
            ))),
        }
    }
}

/// A unit of analysis work for one conversation.
///
/// Timestamps are milliseconds since the epoch. `locked_at` doubles as the
/// ownership token: the worker that set it is the only one allowed to
/// write a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub conversation_id: ConversationId,
    pub status: JobStatus,
    pub strategy: AnalysisStrategy,
    pub locked_at: Option<i64>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl AnalysisJob {
    pub fn new(
        id: impl Into<String>,
        conversation_id: ConversationId,
        strategy: AnalysisStrategy,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id,
            status: JobStatus::Queued,
            strategy,
            locked_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// Whether a claim at `now_ms` would succeed.
    pub fn is_claimable(&self, now_ms: i64, lock_ttl_ms: u64) -> bool {
        match self.status {
            JobStatus::Queued => true,
            JobStatus::Running => self
                .locked_at
                .is_none_or(|locked| locked < reclaim_cutoff(now_ms, lock_ttl_ms)),
            JobStatus::Succeeded | JobStatus::Failed => false,
        }
    }

    /// Apply a claim in memory. Stores use an atomic conditional update
    /// with the same predicate instead.
    pub fn claim(&mut self, now_ms: i64, lock_ttl_ms: u64) -> Result<(), DomainError> {
        if !self.is_claimable(now_ms, lock_ttl_ms) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: JobStatus::Running.to_string(),
            });
        }
        self.status = JobStatus::Running;
        self.locked_at = Some(now_ms);
        self.attempts += 1;
        Ok(())
    }

    /// True while the claim identified by `token` is still the current one.
    pub fn is_owned_by(&self, token: i64) -> bool {
        self.status == JobStatus::Running && self.locked_at == Some(token)
    }

    /// Write a terminal status if `token` still owns the job.
    pub fn finish(
        &mut self,
        token: i64,
        outcome: Result<(), String>,
    ) -> Result<JobStatus, DomainError> {
        let to = if outcome.is_ok() {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        if !self.is_owned_by(token) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.last_error = outcome.err();
        Ok(to)
    }
}

/// Running jobs locked before this instant are abandoned.
pub fn reclaim_cutoff(now_ms: i64, lock_ttl_ms: u64) -> i64 {
    now_ms.saturating_sub(i64::try_from(lock_ttl_ms).unwrap_or(i64::MAX))
}
