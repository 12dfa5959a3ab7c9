//! Consolidation value objects

use crate::response::{Response, ResponseId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A group of responses sharing one core meaning, merged into one statement.
///
/// `response_ids` never repeats an id, and every id belongs to the cluster
/// the bucket was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticBucket {
    pub bucket_name: String,
    pub consolidated_statement: String,
    pub response_ids: Vec<ResponseId>,
}

impl SemanticBucket {
    pub fn new(
        bucket_name: impl Into<String>,
        consolidated_statement: impl Into<String>,
        response_ids: Vec<ResponseId>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            consolidated_statement: consolidated_statement.into(),
            response_ids,
        }
    }

    /// A bucket holding one response verbatim.
    pub fn verbatim(response: &Response) -> Self {
        Self::new(
            response.id.to_string(),
            response.text.clone(),
            vec![response.id.clone()],
        )
    }

    /// Id under which feedback on this bucket is recorded.
    pub fn representative_id(&self) -> Option<&ResponseId> {
        self.response_ids.first()
    }

    pub fn len(&self) -> usize {
        self.response_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.response_ids.is_empty()
    }
}

/// Consolidation output for one cluster.
///
/// Invariant: `unconsolidated_ids` and the bucket ids together are exactly
/// the cluster's input ids, each appearing once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub cluster_index: usize,
    pub buckets: Vec<SemanticBucket>,
    pub unconsolidated_ids: Vec<ResponseId>,
    /// True when the model call failed and every response became its own bucket
    #[serde(default)]
    pub degraded: bool,
}

impl ConsolidationResult {
    pub fn empty(cluster_index: usize) -> Self {
        Self {
            cluster_index,
            buckets: Vec::new(),
            unconsolidated_ids: Vec::new(),
            degraded: false,
        }
    }

    /// Single response: one bucket containing it verbatim.
    pub fn single(cluster_index: usize, response: &Response) -> Self {
        Self {
            cluster_index,
            buckets: vec![SemanticBucket::verbatim(response)],
            unconsolidated_ids: Vec::new(),
            degraded: false,
        }
    }

    /// Degenerate result used when the model call fails.
    pub fn fallback(cluster_index: usize, responses: &[Response]) -> Self {
        Self {
            cluster_index,
            buckets: responses.iter().map(SemanticBucket::verbatim).collect(),
            unconsolidated_ids: Vec::new(),
            degraded: true,
        }
    }

    /// Append another batch of the same cluster.
    pub fn merge(mut self, other: ConsolidationResult) -> Self {
        self.buckets.extend(other.buckets);
        self.unconsolidated_ids.extend(other.unconsolidated_ids);
        self.degraded |= other.degraded;
        self
    }

    /// Every id accounted for, buckets first.
    pub fn accounted_ids(&self) -> impl Iterator<Item = &ResponseId> {
        self.buckets
            .iter()
            .flat_map(|b| b.response_ids.iter())
            .chain(self.unconsolidated_ids.iter())
    }

    /// Check the partition invariant against the cluster's input ids.
    pub fn is_partition_of(&self, input_ids: &[ResponseId]) -> bool {
        let expected: HashSet<&ResponseId> = input_ids.iter().collect();
        let mut seen = HashSet::new();
        for id in self.accounted_ids() {
            if !expected.contains(id) || !seen.insert(id) {
                return false;
            }
        }
        seen.len() == expected.len()
    }

    pub fn consolidated_count(&self) -> usize {
        self.buckets.iter().map(SemanticBucket::len).sum()
    }
}
