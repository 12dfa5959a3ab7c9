//! Consolidate Clusters use case
//!
//! Sends each cluster's responses to the language model and turns the
//! answer into a validated [`ConsolidationResult`]. Clusters larger than
//! `max_responses_per_call` are split into batches whose results are
//! merged. Every batch is an independent task: a failed, malformed or
//! timed-out call degrades only that batch to one bucket per response.

use crate::config::BehaviorConfig;
use crate::ports::event_logger::{AnalysisEvent, AnalysisEventLogger, NoAnalysisLogger};
use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use crate::ports::progress::{AnalysisProgressNotifier, NoProgress};
use sensemaker_domain::consolidation::{self, ConsolidationParseError};
use sensemaker_domain::{
    AnalysisConfig, AnalysisPhase, ConsolidationResult, Model, PromptTemplate, Response,
    ResponseId, parse_consolidation_response, reconcile,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Why a consolidation call produced no usable answer
#[derive(Error, Debug)]
pub enum ConsolidationError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Unparseable model output: {0}")]
    Parse(#[from] ConsolidationParseError),

    #[error("Consolidation call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Use case for consolidating clustered responses
pub struct ConsolidateClustersUseCase<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    model: Model,
    config: AnalysisConfig,
    behavior: BehaviorConfig,
    logger: Arc<dyn AnalysisEventLogger>,
}

impl<G: LlmGateway + 'static> ConsolidateClustersUseCase<G> {
    pub fn new(gateway: Arc<G>, model: Model, config: AnalysisConfig) -> Self {
        Self {
            gateway,
            model,
            config,
            behavior: BehaviorConfig::default(),
            logger: Arc::new(NoAnalysisLogger),
        }
    }

    pub fn with_behavior(mut self, behavior: BehaviorConfig) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn AnalysisEventLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Consolidate one cluster.
    pub async fn consolidate(
        &self,
        cluster_index: usize,
        responses: &[Response],
    ) -> ConsolidationResult {
        let mut results = self
            .consolidate_all(vec![responses.to_vec()], &NoProgress)
            .await;
        match results.pop() {
            Some(mut result) => {
                result.cluster_index = cluster_index;
                result
            }
            None => ConsolidationResult::empty(cluster_index),
        }
    }

    /// Consolidate every cluster concurrently.
    ///
    /// `clusters[i]` holds the members of cluster `i`; the output has one
    /// result per cluster, in cluster order.
    pub async fn consolidate_all(
        &self,
        clusters: Vec<Vec<Response>>,
        progress: &dyn AnalysisProgressNotifier,
    ) -> Vec<ConsolidationResult> {
        let cap = self.config.max_responses_per_call;
        progress.on_phase_start(AnalysisPhase::Consolidation, clusters.len());
        info!(
            "Consolidating {} clusters (max {} responses per call)",
            clusters.len(),
            cap
        );

        let mut join_set = JoinSet::new();
        let mut pending: BTreeMap<(usize, usize), Vec<Response>> = BTreeMap::new();
        let mut batch_counts = vec![0usize; clusters.len()];

        for (cluster_index, members) in clusters.iter().enumerate() {
            for (batch_index, batch) in consolidation::batches(members, cap).enumerate() {
                batch_counts[cluster_index] += 1;
                pending.insert((cluster_index, batch_index), batch.to_vec());

                let call = BatchCall {
                    gateway: Arc::clone(&self.gateway),
                    model: self.model.clone(),
                    timeout: self.behavior.timeout,
                    logger: Arc::clone(&self.logger),
                    debug: self.config.debug,
                    cluster_index,
                    batch_index,
                };
                let batch = batch.to_vec();
                join_set.spawn(async move {
                    let result = call.run(&batch).await;
                    (cluster_index, batch_index, result)
                });
            }
        }

        let mut finished: BTreeMap<(usize, usize), ConsolidationResult> = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((cluster_index, batch_index, result)) => {
                    pending.remove(&(cluster_index, batch_index));
                    finished.insert((cluster_index, batch_index), result);
                }
                Err(e) => {
                    warn!("Consolidation task join error: {}", e);
                }
            }
        }

        // Batches whose task panicked still need an answer
        for ((cluster_index, batch_index), batch) in pending {
            warn!(
                "Cluster {} batch {} did not complete, using fallback",
                cluster_index, batch_index
            );
            finished.insert(
                (cluster_index, batch_index),
                ConsolidationResult::fallback(cluster_index, &batch),
            );
        }

        let mut results: Vec<ConsolidationResult> = (0..clusters.len())
            .map(ConsolidationResult::empty)
            .collect();
        for ((cluster_index, _), result) in finished {
            let merged = std::mem::replace(
                &mut results[cluster_index],
                ConsolidationResult::empty(cluster_index),
            );
            results[cluster_index] = merged.merge(result);
        }

        for (result, batches) in results.iter().zip(&batch_counts) {
            debug!(
                "Cluster {}: {} buckets, {} unconsolidated over {} batch(es)",
                result.cluster_index,
                result.buckets.len(),
                result.unconsolidated_ids.len(),
                batches
            );
            progress.on_cluster_consolidated(
                result.cluster_index,
                result.buckets.len(),
                result.degraded,
            );
        }

        progress.on_phase_complete(AnalysisPhase::Consolidation);
        results
    }
}

/// Everything one spawned batch needs, owned
struct BatchCall<G: LlmGateway + 'static> {
    gateway: Arc<G>,
    model: Model,
    timeout: Option<Duration>,
    logger: Arc<dyn AnalysisEventLogger>,
    debug: bool,
    cluster_index: usize,
    batch_index: usize,
}

impl<G: LlmGateway + 'static> BatchCall<G> {
    async fn run(&self, batch: &[Response]) -> ConsolidationResult {
        match batch {
            [] => return ConsolidationResult::empty(self.cluster_index),
            [only] => return ConsolidationResult::single(self.cluster_index, only),
            _ => {}
        }

        let input_ids: Vec<ResponseId> = batch.iter().map(|r| r.id.clone()).collect();

        match self.call_model(batch).await {
            Ok(raw) => {
                let (result, report) = reconcile(self.cluster_index, &input_ids, raw);

                if !report.hallucinated_ids.is_empty() {
                    warn!(
                        "Cluster {}: dropped {} id(s) not present in the input: {:?}",
                        self.cluster_index,
                        report.hallucinated_ids.len(),
                        report.hallucinated_ids
                    );
                    self.logger.log(AnalysisEvent::new(
                        "hallucinated_ids",
                        json!({
                            "cluster_index": self.cluster_index,
                            "batch_index": self.batch_index,
                            "ids": report.hallucinated_ids,
                        }),
                    ));
                }
                if !report.recovered_ids.is_empty() {
                    warn!(
                        "Cluster {}: model omitted {} id(s), moved to unconsolidated",
                        self.cluster_index,
                        report.recovered_ids.len()
                    );
                }
                if !report.duplicate_ids.is_empty() || report.discarded_buckets > 0 {
                    debug!(
                        "Cluster {}: {} duplicate id(s), {} bucket(s) discarded",
                        self.cluster_index,
                        report.duplicate_ids.len(),
                        report.discarded_buckets
                    );
                }
                result
            }
            Err(e) => {
                warn!(
                    "Cluster {} batch {} consolidation failed, using fallback: {}",
                    self.cluster_index, self.batch_index, e
                );
                self.logger.log(AnalysisEvent::new(
                    "consolidation_fallback",
                    json!({
                        "cluster_index": self.cluster_index,
                        "batch_index": self.batch_index,
                        "response_count": batch.len(),
                        "error": e.to_string(),
                    }),
                ));
                ConsolidationResult::fallback(self.cluster_index, batch)
            }
        }
    }

    async fn call_model(
        &self,
        batch: &[Response],
    ) -> Result<consolidation::RawConsolidation, ConsolidationError> {
        let prompt = PromptTemplate::consolidation_prompt(batch);

        self.logger.log(AnalysisEvent::new(
            "consolidation_request",
            json!({
                "cluster_index": self.cluster_index,
                "batch_index": self.batch_index,
                "model": self.model.to_string(),
                "response_count": batch.len(),
                "prompt": if self.debug { Some(prompt.as_str()) } else { None },
            }),
        ));

        let call = async {
            let session = self
                .gateway
                .create_session_with_system_prompt(
                    &self.model,
                    PromptTemplate::consolidation_system(),
                )
                .await?;
            Ok::<String, GatewayError>(session.send_json(&prompt).await?)
        };

        let text = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| ConsolidationError::Timeout(timeout))??,
            None => call.await?,
        };

        if self.debug {
            debug!("Cluster {} raw model output: {}", self.cluster_index, text);
        }
        self.logger.log(AnalysisEvent::new(
            "consolidation_response",
            json!({
                "cluster_index": self.cluster_index,
                "batch_index": self.batch_index,
                "bytes": text.len(),
                "text": if self.debug { Some(text.as_str()) } else { None },
            }),
        ));

        Ok(parse_consolidation_response(&text)?)
    }
}
