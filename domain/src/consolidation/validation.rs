//! Reconciling model output with the known input set.
//!
//! The model is not trusted: ids it invents are dropped, ids it repeats
//! across buckets stay with the first bucket, and ids it forgets are
//! appended to the unconsolidated list. The returned result always
//! partitions the input ids exactly.

use super::entities::{ConsolidationResult, SemanticBucket};
use super::parsing::RawConsolidation;
use crate::response::ResponseId;
use std::collections::HashSet;

/// What had to be corrected in the model's answer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Ids the model returned that were never in the input
    pub hallucinated_ids: Vec<String>,
    /// Ids the model placed in more than one bucket (kept in the first)
    pub duplicate_ids: Vec<ResponseId>,
    /// Buckets dropped for having no valid ids or no statement
    pub discarded_buckets: usize,
    /// Input ids the model left out, recovered into `unconsolidated_ids`
    pub recovered_ids: Vec<ResponseId>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.hallucinated_ids.is_empty()
            && self.duplicate_ids.is_empty()
            && self.discarded_buckets == 0
            && self.recovered_ids.is_empty()
    }
}

/// Build a validated [`ConsolidationResult`] from raw model output.
pub fn reconcile(
    cluster_index: usize,
    input_ids: &[ResponseId],
    raw: RawConsolidation,
) -> (ConsolidationResult, ValidationReport) {
    let valid: HashSet<&str> = input_ids.iter().map(ResponseId::as_str).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut report = ValidationReport::default();
    let mut buckets = Vec::with_capacity(raw.buckets.len());

    for raw_bucket in raw.buckets {
        let mut ids = Vec::with_capacity(raw_bucket.response_ids.len());
        for id in raw_bucket.response_ids {
            if !valid.contains(id.as_str()) {
                report.hallucinated_ids.push(id);
            } else if placed.contains(&id) {
                if !ids.iter().any(|r: &ResponseId| r.as_str() == id) {
                    report.duplicate_ids.push(ResponseId::new(id));
                }
            } else {
                placed.insert(id.clone());
                ids.push(ResponseId::new(id));
            }
        }

        if ids.is_empty() || raw_bucket.consolidated_statement.is_empty() {
            // Ids of a statement-less bucket fall through to recovery below
            for id in &ids {
                placed.remove(id.as_str());
            }
            report.discarded_buckets += 1;
            continue;
        }

        let name = if raw_bucket.bucket_name.is_empty() {
            format!("Group {}", buckets.len() + 1)
        } else {
            raw_bucket.bucket_name
        };
        buckets.push(SemanticBucket::new(name, raw_bucket.consolidated_statement, ids));
    }

    let mut unconsolidated = Vec::new();
    for id in raw.unconsolidated_ids {
        if !valid.contains(id.as_str()) {
            report.hallucinated_ids.push(id);
        } else if placed.insert(id.clone()) {
            unconsolidated.push(ResponseId::new(id));
        }
    }

    for id in input_ids {
        if placed.insert(id.as_str().to_string()) {
            report.recovered_ids.push(id.clone());
            unconsolidated.push(id.clone());
        }
    }

    let result = ConsolidationResult {
        cluster_index,
        buckets,
        unconsolidated_ids: unconsolidated,
        degraded: false,
    };
    (result, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::parsing::{RawBucket, parse_consolidation_response};

    fn ids(raw: &[&str]) -> Vec<ResponseId> {
        raw.iter().map(|s| ResponseId::new(*s)).collect()
    }

    fn bucket(name: &str, statement: &str, ids: &[&str]) -> RawBucket {
        RawBucket {
            bucket_name: name.to_string(),
            consolidated_statement: statement.to_string(),
            response_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_clean_output_passes_through() {
        let input = ids(&["a", "b", "c"]);
        let raw = RawConsolidation {
            buckets: vec![bucket("Parks", "More green space.", &["a", "b"])],
            unconsolidated_ids: vec!["c".to_string()],
        };

        let (result, report) = reconcile(0, &input, raw);
        assert!(report.is_clean());
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].response_ids, ids(&["a", "b"]));
        assert_eq!(result.unconsolidated_ids, ids(&["c"]));
        assert!(result.is_partition_of(&input));
    }

    #[test]
    fn test_fabricated_id_is_removed_everywhere() {
        let input = ids(&["r1", "r2"]);
        let text = r#"{"buckets": [{"bucket_name": "Safety", "consolidated_statement": "Add crosswalks.", "response_ids": ["r1", "r999"]}], "unconsolidated_ids": []}"#;
        let raw = parse_consolidation_response(text).unwrap();

        let (result, report) = reconcile(2, &input, raw);

        assert_eq!(result.buckets[0].response_ids, ids(&["r1"]));
        assert_eq!(report.hallucinated_ids, vec!["r999".to_string()]);
        assert!(result.accounted_ids().all(|id| id.as_str() != "r999"));
        // r2 was omitted by the model
        assert_eq!(result.unconsolidated_ids, ids(&["r2"]));
        assert_eq!(report.recovered_ids, ids(&["r2"]));
        assert!(result.is_partition_of(&input));
    }

    #[test]
    fn test_bucket_with_only_invented_ids_is_discarded() {
        let input = ids(&["a", "b"]);
        let raw = RawConsolidation {
            buckets: vec![
                bucket("Ghost", "Nobody said this.", &["x", "y"]),
                bucket("Real", "Somebody said this.", &["a", "b"]),
            ],
            unconsolidated_ids: vec![],
        };

        let (result, report) = reconcile(0, &input, raw);
        assert_eq!(result.buckets.len(), 1);
        assert_eq!(result.buckets[0].bucket_name, "Real");
        assert_eq!(report.discarded_buckets, 1);
        assert_eq!(report.hallucinated_ids.len(), 2);
    }

    #[test]
    fn test_duplicate_across_buckets_stays_in_first() {
        let input = ids(&["a", "b", "c"]);
        let raw = RawConsolidation {
            buckets: vec![
                bucket("One", "First.", &["a", "b"]),
                bucket("Two", "Second.", &["b", "c"]),
            ],
            unconsolidated_ids: vec!["a".to_string()],
        };

        let (result, report) = reconcile(0, &input, raw);
        assert_eq!(result.buckets[0].response_ids, ids(&["a", "b"]));
        assert_eq!(result.buckets[1].response_ids, ids(&["c"]));
        assert_eq!(report.duplicate_ids, ids(&["b"]));
        assert!(result.unconsolidated_ids.is_empty());
        assert!(result.is_partition_of(&input));
    }

    #[test]
    fn test_repeated_id_within_bucket_collapses() {
        let input = ids(&["a"]);
        let raw = RawConsolidation {
            buckets: vec![bucket("One", "Only.", &["a", "a"])],
            unconsolidated_ids: vec![],
        };

        let (result, report) = reconcile(0, &input, raw);
        assert_eq!(result.buckets[0].response_ids, ids(&["a"]));
        assert!(report.duplicate_ids.is_empty());
    }

    #[test]
    fn test_statementless_bucket_releases_its_ids() {
        let input = ids(&["a", "b"]);
        let raw = RawConsolidation {
            buckets: vec![bucket("Empty", "", &["a", "b"])],
            unconsolidated_ids: vec![],
        };

        let (result, report) = reconcile(0, &input, raw);
        assert!(result.buckets.is_empty());
        assert_eq!(result.unconsolidated_ids, input);
        assert_eq!(report.discarded_buckets, 1);
        assert!(result.is_partition_of(&input));
    }

    #[test]
    fn test_unnamed_bucket_gets_placeholder() {
        let input = ids(&["a"]);
        let raw = RawConsolidation {
            buckets: vec![bucket("", "Statement.", &["a"])],
            unconsolidated_ids: vec![],
        };

        let (result, _) = reconcile(0, &input, raw);
        assert_eq!(result.buckets[0].bucket_name, "Group 1");
    }

    #[test]
    fn test_empty_model_output_recovers_everything() {
        let input = ids(&["a", "b", "c"]);
        let (result, report) = reconcile(0, &input, RawConsolidation::default());
        assert_eq!(result.unconsolidated_ids, input);
        assert_eq!(report.recovered_ids.len(), 3);
    }
}
