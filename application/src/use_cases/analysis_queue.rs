//! Analysis queue
//!
//! Tracks background analysis runs on a [`JoinSet`] so every spawned run
//! can be observed and awaited. Each submission returns an
//! [`AnalysisTicket`] resolving to the run's [`RunStatus`].

use crate::ports::llm_gateway::LlmGateway;
use crate::ports::repository::RepositoryError;
use crate::use_cases::run_analysis::{RunAnalysisOutcome, RunAnalysisUseCase};
use sensemaker_domain::{AnalysisJob, AnalysisStrategy, ConversationId};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Final status of one queued run
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Succeeded,
    NotClaimed,
    Superseded,
    Failed(String),
}

impl RunStatus {
    fn from_result<E: std::fmt::Display>(result: Result<RunAnalysisOutcome, E>) -> Self {
        match result {
            Ok(RunAnalysisOutcome::Completed(_)) => RunStatus::Succeeded,
            Ok(RunAnalysisOutcome::NotClaimed) => RunStatus::NotClaimed,
            Ok(RunAnalysisOutcome::Superseded) => RunStatus::Superseded,
            Err(e) => RunStatus::Failed(e.to_string()),
        }
    }
}

/// Handle on a queued run
pub struct AnalysisTicket {
    pub job_id: String,
    receiver: oneshot::Receiver<RunStatus>,
}

impl AnalysisTicket {
    /// Wait for the run to finish.
    pub async fn wait(self) -> RunStatus {
        self.receiver
            .await
            .unwrap_or_else(|_| RunStatus::Failed("analysis task aborted".to_string()))
    }
}

/// Queue of background analysis runs
pub struct AnalysisQueue<G: LlmGateway + 'static> {
    use_case: Arc<RunAnalysisUseCase<G>>,
    tasks: JoinSet<(String, RunStatus)>,
}

impl<G: LlmGateway + 'static> AnalysisQueue<G> {
    pub fn new(use_case: Arc<RunAnalysisUseCase<G>>) -> Self {
        Self {
            use_case,
            tasks: JoinSet::new(),
        }
    }

    /// Create a queued job for `conversation_id` and schedule it.
    pub async fn submit(
        &mut self,
        conversation_id: ConversationId,
        strategy: AnalysisStrategy,
    ) -> Result<AnalysisTicket, RepositoryError> {
        let job = AnalysisJob::new(uuid::Uuid::new_v4().to_string(), conversation_id, strategy);
        self.use_case.jobs().create_job(&job).await?;
        info!("Queued analysis job {} for {}", job.id, job.conversation_id);
        Ok(self.schedule(&job.id))
    }

    /// Schedule a run of an existing job.
    pub fn schedule(&mut self, job_id: &str) -> AnalysisTicket {
        let (sender, receiver) = oneshot::channel();
        let use_case = Arc::clone(&self.use_case);
        let id = job_id.to_string();

        self.tasks.spawn(async move {
            let status = RunStatus::from_result(use_case.execute(&id).await);
            // The ticket may have been dropped; the status is still returned by drain()
            let _ = sender.send(status.clone());
            (id, status)
        });

        AnalysisTicket {
            job_id: job_id.to_string(),
            receiver,
        }
    }

    /// Number of runs not yet collected by [`Self::drain`].
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every scheduled run and return their statuses in
    /// completion order.
    pub async fn drain(&mut self) -> Vec<(String, RunStatus)> {
        let mut finished = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(entry) => finished.push(entry),
                Err(e) => warn!("Analysis task join error: {}", e),
            }
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::embedding::{EmbeddingError, EmbeddingService};
    use crate::ports::llm_gateway::{GatewayError, LlmSession};
    use crate::ports::repository::{ConversationRepository, JobOutcome, JobRepository};
    use crate::use_cases::consolidate_clusters::ConsolidateClustersUseCase;
    use async_trait::async_trait;
    use sensemaker_domain::{
        AnalysisConfig, AnalysisReport, Embedding, FeedbackVote, JobStatus, Model, Response,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Store {
        jobs: Mutex<HashMap<String, AnalysisJob>>,
        saved: Mutex<usize>,
    }

    #[async_trait]
    impl JobRepository for Store {
        async fn create_job(&self, job: &AnalysisJob) -> Result<(), RepositoryError> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn claim(
            &self,
            job_id: &str,
            now_ms: i64,
            lock_ttl_ms: u64,
        ) -> Result<Option<i64>, RepositoryError> {
            let mut jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .get_mut(job_id)
                .and_then(|job| job.claim(now_ms, lock_ttl_ms).ok())
                .map(|_| now_ms))
        }

        async fn get_job(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }

        async fn finish(
            &self,
            job_id: &str,
            token: i64,
            outcome: &JobOutcome,
        ) -> Result<bool, RepositoryError> {
            let mut jobs = self.jobs.lock().unwrap();
            let outcome = match outcome {
                JobOutcome::Succeeded => Ok(()),
                JobOutcome::Failed(e) => Err(e.clone()),
            };
            Ok(jobs
                .get_mut(job_id)
                .is_some_and(|job| job.finish(token, outcome).is_ok()))
        }

        async fn complete(
            &self,
            job_id: &str,
            token: i64,
            _report: &AnalysisReport,
        ) -> Result<bool, RepositoryError> {
            let mut jobs = self.jobs.lock().unwrap();
            let done = jobs
                .get_mut(job_id)
                .is_some_and(|job| job.finish(token, Ok(())).is_ok());
            if done {
                *self.saved.lock().unwrap() += 1;
            }
            Ok(done)
        }
    }

    #[async_trait]
    impl ConversationRepository for Store {
        async fn responses(
            &self,
            _conversation_id: &ConversationId,
        ) -> Result<Vec<Response>, RepositoryError> {
            Ok(vec![
                Response::new("a", "only one").with_embedding(vec![1.0, 2.0]),
            ])
        }

        async fn feedback(
            &self,
            _conversation_id: &ConversationId,
        ) -> Result<Vec<FeedbackVote>, RepositoryError> {
            Ok(vec![])
        }

        async fn set_conversation_error(
            &self,
            _conversation_id: &ConversationId,
            _error: Option<&str>,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    struct NoEmbedder;

    #[async_trait]
    impl EmbeddingService for NoEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
            Err(EmbeddingError::RequestFailed("not expected".to_string()))
        }
    }

    struct NoGateway;

    #[async_trait]
    impl LlmGateway for NoGateway {
        async fn create_session_with_system_prompt(
            &self,
            _model: &Model,
            _system_prompt: &str,
        ) -> Result<Box<dyn LlmSession>, GatewayError> {
            Err(GatewayError::ModelNotAvailable("none".to_string()))
        }

        async fn available_models(&self) -> Result<Vec<Model>, GatewayError> {
            Ok(vec![])
        }
    }

    fn queue(store: Arc<Store>) -> AnalysisQueue<NoGateway> {
        let config = AnalysisConfig::default();
        let consolidator =
            ConsolidateClustersUseCase::new(Arc::new(NoGateway), Model::default(), config.clone());
        let use_case = RunAnalysisUseCase::new(
            store.clone(),
            store,
            Arc::new(NoEmbedder),
            consolidator,
            config,
        );
        AnalysisQueue::new(Arc::new(use_case))
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let store = Arc::new(Store::default());
        let mut queue = queue(store.clone());

        let ticket = queue
            .submit(ConversationId::new("c1"), AnalysisStrategy::Full)
            .await
            .unwrap();
        let job_id = ticket.job_id.clone();

        assert_eq!(ticket.wait().await, RunStatus::Succeeded);
        let job = store.jobs.lock().unwrap().get(&job_id).cloned().unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_duplicate_schedules_run_once() {
        let store = Arc::new(Store::default());
        let mut queue = queue(store.clone());

        let ticket = queue
            .submit(ConversationId::new("c1"), AnalysisStrategy::Incremental)
            .await
            .unwrap();
        let job_id = ticket.job_id.clone();
        queue.schedule(&job_id);
        queue.schedule(&job_id);
        assert_eq!(queue.pending(), 3);

        let statuses = queue.drain().await;
        assert_eq!(statuses.len(), 3);
        assert_eq!(
            statuses
                .iter()
                .filter(|(_, s)| *s == RunStatus::Succeeded)
                .count(),
            1
        );
        assert_eq!(*store.saved.lock().unwrap(), 1);
        assert_eq!(queue.pending(), 0);
    }
}
