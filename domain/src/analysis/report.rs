//! Output of a completed analysis run

use crate::clustering::{ClusterSummary, ClusteringOutcome, KSelection};
use crate::consensus::{ConsensusMetrics, StatementAgreement};
use crate::consolidation::ConsolidationResult;
use crate::response::{ConversationId, ResponseId};
use serde::{Deserialize, Serialize};

/// How the responses were grouped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSummary {
    pub k: usize,
    pub selection: KSelection,
    pub distortions: Vec<f64>,
    pub clusters: Vec<ClusterSummary>,
}

impl ClusteringSummary {
    pub fn new(outcome: &ClusteringOutcome, clusters: Vec<ClusterSummary>) -> Self {
        Self {
            k: outcome.k,
            selection: outcome.selection,
            distortions: outcome.distortions.clone(),
            clusters,
        }
    }
}

/// Everything one run produces for a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub conversation_id: ConversationId,
    pub response_count: usize,
    pub clustering: ClusteringSummary,
    pub consolidations: Vec<ConsolidationResult>,
    pub metrics: ConsensusMetrics,
    pub agreements: Vec<StatementAgreement>,
}

impl AnalysisReport {
    /// Ids the statements of this report are keyed by: bucket
    /// representatives followed by unconsolidated responses.
    pub fn statement_ids(&self) -> Vec<ResponseId> {
        let buckets = self
            .consolidations
            .iter()
            .flat_map(|c| c.buckets.iter())
            .filter_map(|b| b.representative_id().cloned());
        let loose = self
            .consolidations
            .iter()
            .flat_map(|c| c.unconsolidated_ids.iter().cloned());
        buckets.chain(loose).collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.consolidations.iter().map(|c| c.buckets.len()).sum()
    }

    pub fn unconsolidated_count(&self) -> usize {
        self.consolidations
            .iter()
            .map(|c| c.unconsolidated_ids.len())
            .sum()
    }

    pub fn degraded_clusters(&self) -> usize {
        self.consolidations.iter().filter(|c| c.degraded).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::SemanticBucket;

    #[test]
    fn test_statement_ids_buckets_then_loose() {
        let report = AnalysisReport {
            conversation_id: ConversationId::new("c"),
            response_count: 4,
            clustering: ClusteringSummary {
                k: 1,
                selection: KSelection::Homogeneous,
                distortions: vec![],
                clusters: vec![],
            },
            consolidations: vec![ConsolidationResult {
                cluster_index: 0,
                buckets: vec![SemanticBucket::new(
                    "n",
                    "s",
                    vec![ResponseId::new("b"), ResponseId::new("a")],
                )],
                unconsolidated_ids: vec![ResponseId::new("c"), ResponseId::new("d")],
                degraded: false,
            }],
            metrics: ConsensusMetrics::default(),
            agreements: vec![],
        };

        let ids: Vec<String> = report.statement_ids().iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert_eq!(report.bucket_count(), 1);
        assert_eq!(report.unconsolidated_count(), 2);
        assert_eq!(report.degraded_clusters(), 0);
    }
}
