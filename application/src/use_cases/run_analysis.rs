//! Run Analysis use case
//!
//! One worker invocation for one analysis job:
//!
//! 1. Claim the job (atomic conditional update). Losing the claim is a
//!    silent no-op.
//! 2. Embed, cluster, consolidate and aggregate consensus.
//! 3. Re-read the job. If another worker reclaimed it meanwhile, discard
//!    the result.
//! 4. Write the terminal status and the report in one step guarded by the
//!    claim token, so a reclaim after the re-read still discards it.
//!
//! Failures are recorded on the job and on the conversation, best effort.

use crate::ports::embedding::{EmbeddingError, EmbeddingService, embed_all};
use crate::ports::event_logger::{AnalysisEvent, AnalysisEventLogger, NoAnalysisLogger};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::progress::{AnalysisProgressNotifier, NoProgress};
use crate::ports::repository::{
    ConversationRepository, JobOutcome, JobRepository, RepositoryError,
};
use crate::use_cases::consolidate_clusters::ConsolidateClustersUseCase;
use sensemaker_domain::{
    AdaptiveClusterer, AnalysisConfig, AnalysisJob, AnalysisPhase, AnalysisReport,
    ClusteringOutcome, ClusteringSummary, ConsolidationResult, DEFAULT_IQR_THRESHOLD,
    DomainError, FeedbackVote, Response, SemanticBucket, agreement_for_buckets,
    agreement_for_responses, compute_consensus, resolve_to_representatives, summarize,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during an analysis run
#[derive(Error, Debug)]
pub enum RunAnalysisError {
    #[error("Analysis job not found: {0}")]
    JobNotFound(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Clustering(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),
}

/// What happened to a job from this worker's point of view
#[derive(Debug)]
pub enum RunAnalysisOutcome {
    /// This worker ran the job and recorded success
    Completed(Box<AnalysisReport>),
    /// Another worker holds the job or it is already finished
    NotClaimed,
    /// The job was reclaimed while this worker ran; its result was discarded
    Superseded,
}

/// Source of the current time in milliseconds since the epoch
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Use case for running one analysis job
pub struct RunAnalysisUseCase<G: LlmGateway + 'static> {
    jobs: Arc<dyn JobRepository>,
    conversations: Arc<dyn ConversationRepository>,
    embedder: Arc<dyn EmbeddingService>,
    consolidator: ConsolidateClustersUseCase<G>,
    config: AnalysisConfig,
    logger: Arc<dyn AnalysisEventLogger>,
    clock: Clock,
}

impl<G: LlmGateway + 'static> RunAnalysisUseCase<G> {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        conversations: Arc<dyn ConversationRepository>,
        embedder: Arc<dyn EmbeddingService>,
        consolidator: ConsolidateClustersUseCase<G>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            jobs,
            conversations,
            embedder,
            consolidator,
            config,
            logger: Arc::new(NoAnalysisLogger),
            clock: system_clock(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn AnalysisEventLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, job_id: &str) -> Result<RunAnalysisOutcome, RunAnalysisError> {
        self.execute_with_progress(job_id, &NoProgress).await
    }

    /// Execute the use case with progress callbacks
    pub async fn execute_with_progress(
        &self,
        job_id: &str,
        progress: &dyn AnalysisProgressNotifier,
    ) -> Result<RunAnalysisOutcome, RunAnalysisError> {
        let now = (self.clock)();
        let Some(token) = self.jobs.claim(job_id, now, self.config.lock_ttl_ms).await? else {
            info!("Job {} is owned by another worker or finished, skipping", job_id);
            return Ok(RunAnalysisOutcome::NotClaimed);
        };

        info!("Claimed job {} (token {})", job_id, token);
        self.logger.log(AnalysisEvent::new(
            "job_claimed",
            json!({ "job_id": job_id, "token": token }),
        ));

        let job = match self.jobs.get_job(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                let error = RunAnalysisError::JobNotFound(job_id.to_string());
                self.record_failure(job_id, token, None, &error).await;
                return Err(error);
            }
            Err(e) => {
                let error = RunAnalysisError::from(e);
                self.record_failure(job_id, token, None, &error).await;
                return Err(error);
            }
        };

        let result = self.analyze(&job, progress).await;

        if !self.still_owned(job_id, token).await {
            warn!("Job {} was reclaimed by another worker, discarding result", job_id);
            self.logger.log(AnalysisEvent::new(
                "job_superseded",
                json!({ "job_id": job_id, "token": token }),
            ));
            return Ok(RunAnalysisOutcome::Superseded);
        }

        let report = match result {
            Ok(report) => report,
            Err(error) => {
                self.record_failure(job_id, token, Some(&job), &error).await;
                return Err(error);
            }
        };

        match self.jobs.complete(job_id, token, &report).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Job {} was reclaimed before its result could be written", job_id);
                self.logger.log(AnalysisEvent::new(
                    "job_superseded",
                    json!({ "job_id": job_id, "token": token }),
                ));
                return Ok(RunAnalysisOutcome::Superseded);
            }
            Err(e) => {
                let error = RunAnalysisError::from(e);
                self.record_failure(job_id, token, Some(&job), &error).await;
                return Err(error);
            }
        }

        if let Err(e) = self
            .conversations
            .set_conversation_error(&job.conversation_id, None)
            .await
        {
            warn!("Failed to clear conversation error: {}", e);
        }

        self.logger.log(AnalysisEvent::new(
            "job_finished",
            json!({
                "job_id": job_id,
                "status": "succeeded",
                "buckets": report.bucket_count(),
                "unconsolidated": report.unconsolidated_count(),
            }),
        ));
        info!(
            "Job {} succeeded: {} responses, {} clusters, {} buckets",
            job_id,
            report.response_count,
            report.clustering.k,
            report.bucket_count()
        );

        Ok(RunAnalysisOutcome::Completed(Box::new(report)))
    }

    /// The full pipeline for one conversation.
    async fn analyze(
        &self,
        job: &AnalysisJob,
        progress: &dyn AnalysisProgressNotifier,
    ) -> Result<AnalysisReport, RunAnalysisError> {
        info!(
            "Analyzing conversation {} ({} strategy)",
            job.conversation_id, job.strategy
        );

        let mut responses = self.conversations.responses(&job.conversation_id).await?;
        progress.on_phase_start(AnalysisPhase::Embedding, responses.len());
        self.embed_missing(&mut responses).await?;
        progress.on_phase_complete(AnalysisPhase::Embedding);

        progress.on_phase_start(AnalysisPhase::Clustering, 1);
        let embeddings: Vec<Vec<f32>> = responses
            .iter()
            .map(|r| r.embedding.clone().unwrap_or_default())
            .collect();
        let clusterer = AdaptiveClusterer::new(self.config.clone());
        let outcome = tokio::task::spawn_blocking(move || clusterer.analyze(&embeddings, None))
            .await
            .map_err(|e| DomainError::ClusteringFailed(e.to_string()))??;
        info!(
            "Chose k = {} for {} responses ({:?})",
            outcome.k,
            responses.len(),
            outcome.selection
        );
        if self.config.debug {
            debug!("Distortion curve: {:?}", outcome.distortions);
        }
        progress.on_phase_complete(AnalysisPhase::Clustering);

        let clusters: Vec<Vec<Response>> = outcome
            .members()
            .into_iter()
            .map(|members| members.into_iter().map(|i| responses[i].clone()).collect())
            .collect();
        let consolidations = self.consolidator.consolidate_all(clusters, progress).await;

        progress.on_phase_start(AnalysisPhase::Consensus, 1);
        let votes = self.conversations.feedback(&job.conversation_id).await?;
        let report = build_report(job, &responses, &outcome, consolidations, &votes);
        progress.on_phase_complete(AnalysisPhase::Consensus);

        Ok(report)
    }

    async fn embed_missing(&self, responses: &mut [Response]) -> Result<(), RunAnalysisError> {
        let missing: Vec<usize> = responses
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_embedded())
            .map(|(i, _)| i)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        debug!("Embedding {} responses", missing.len());
        let texts: Vec<String> = missing.iter().map(|&i| responses[i].text.clone()).collect();
        let vectors = embed_all(self.embedder.as_ref(), &texts).await?;
        for (i, vector) in missing.into_iter().zip(vectors) {
            responses[i].embedding = Some(vector);
        }
        Ok(())
    }

    async fn still_owned(&self, job_id: &str, token: i64) -> bool {
        match self.jobs.get_job(job_id).await {
            Ok(Some(job)) => job.is_owned_by(token),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not re-read job {}: {}", job_id, e);
                false
            }
        }
    }

    /// Record a failure on the job and its conversation. Never fails.
    async fn record_failure(
        &self,
        job_id: &str,
        token: i64,
        job: Option<&AnalysisJob>,
        error: &RunAnalysisError,
    ) {
        let message = error.to_string();
        warn!("Job {} failed: {}", job_id, message);

        match self
            .jobs
            .finish(job_id, token, &JobOutcome::Failed(message.clone()))
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Job {} was reclaimed, failure not recorded", job_id),
            Err(e) => warn!("Failed to record failure on job {}: {}", job_id, e),
        }

        if let Some(job) = job
            && let Err(e) = self
                .conversations
                .set_conversation_error(&job.conversation_id, Some(&message))
                .await
        {
            warn!(
                "Failed to record error on conversation {}: {}",
                job.conversation_id, e
            );
        }

        self.logger.log(AnalysisEvent::new(
            "job_finished",
            json!({ "job_id": job_id, "status": "failed", "error": message }),
        ));
    }
}

/// Assemble the report once consolidation is done.
fn build_report(
    job: &AnalysisJob,
    responses: &[Response],
    outcome: &ClusteringOutcome,
    consolidations: Vec<ConsolidationResult>,
    votes: &[FeedbackVote],
) -> AnalysisReport {
    let buckets: Vec<SemanticBucket> = consolidations
        .iter()
        .flat_map(|c| c.buckets.iter().cloned())
        .collect();
    let loose: HashSet<&str> = consolidations
        .iter()
        .flat_map(|c| c.unconsolidated_ids.iter().map(|id| id.as_str()))
        .collect();
    let loose_responses: Vec<Response> = responses
        .iter()
        .filter(|r| loose.contains(r.id.as_str()))
        .cloned()
        .collect();

    let mut agreements = agreement_for_buckets(&buckets, votes);
    agreements.extend(agreement_for_responses(&loose_responses, votes));

    let mut report = AnalysisReport {
        conversation_id: job.conversation_id.clone(),
        response_count: responses.len(),
        clustering: ClusteringSummary::new(outcome, summarize(outcome, None, DEFAULT_IQR_THRESHOLD)),
        consolidations,
        metrics: Default::default(),
        agreements,
    };

    let statement_ids: Vec<String> = report
        .statement_ids()
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    let resolved = resolve_to_representatives(&buckets, votes);
    report.metrics = compute_consensus(
        &statement_ids,
        responses.iter().filter_map(|r| r.author_id.as_deref()),
        &resolved,
    );
    report
}
