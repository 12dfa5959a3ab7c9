//! Per-statement agreement summaries.
//!
//! Statements come in two shapes: raw responses, where feedback is keyed by
//! the response id, and consolidated buckets, where feedback is recorded
//! against the bucket's representative id. Both produce the same
//! [`StatementAgreement`] rows.

use super::metrics::percent;
use super::vote::{FeedbackValue, FeedbackVote, latest_votes};
use crate::consolidation::SemanticBucket;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementAgreement {
    pub statement_id: String,
    pub agree: usize,
    pub disagree: usize,
    pub pass: usize,
    pub total: usize,
    pub agree_percent: u32,
    pub disagree_percent: u32,
    pub pass_percent: u32,
    /// `(agree - disagree) / total`, in `[-1, 1]`; 0 without votes
    pub consensus_score: f64,
}

impl StatementAgreement {
    fn tally<'a>(statement_id: String, votes: impl IntoIterator<Item = &'a FeedbackVote>) -> Self {
        let (mut agree, mut disagree, mut pass) = (0, 0, 0);
        for vote in votes {
            match vote.value {
                FeedbackValue::Agree => agree += 1,
                FeedbackValue::Disagree => disagree += 1,
                FeedbackValue::Pass => pass += 1,
            }
        }
        let total = agree + disagree + pass;
        let consensus_score = if total == 0 {
            0.0
        } else {
            (agree as f64 - disagree as f64) / total as f64
        };

        Self {
            statement_id,
            agree,
            disagree,
            pass,
            total,
            agree_percent: percent(agree, total),
            disagree_percent: percent(disagree, total),
            pass_percent: percent(pass, total),
            consensus_score,
        }
    }
}

/// Agreement for each raw response, in input order.
pub fn agreement_for_responses(
    responses: &[Response],
    votes: &[FeedbackVote],
) -> Vec<StatementAgreement> {
    let live = latest_votes(votes);
    let mut by_statement: HashMap<&str, Vec<&FeedbackVote>> = HashMap::new();
    for vote in &live {
        by_statement
            .entry(vote.statement_id.as_str())
            .or_default()
            .push(vote);
    }

    responses
        .iter()
        .map(|response| {
            let id = response.id.as_str();
            let votes = by_statement.get(id).map(Vec::as_slice).unwrap_or_default();
            StatementAgreement::tally(id.to_string(), votes.iter().copied())
        })
        .collect()
}

/// Rewrite votes on bucket members to the bucket's representative id.
///
/// Votes on ids outside every bucket are passed through unchanged, so
/// feedback on unconsolidated responses keeps its own statement id.
pub fn resolve_to_representatives(
    buckets: &[SemanticBucket],
    votes: &[FeedbackVote],
) -> Vec<FeedbackVote> {
    let owner = member_owners(buckets);
    votes
        .iter()
        .map(|vote| match owner.get(vote.statement_id.as_str()) {
            Some(rep) => FeedbackVote {
                statement_id: (*rep).to_string(),
                ..vote.clone()
            },
            None => vote.clone(),
        })
        .collect()
}

fn member_owners(buckets: &[SemanticBucket]) -> HashMap<&str, &str> {
    let mut owner = HashMap::new();
    for bucket in buckets {
        let Some(representative) = bucket.representative_id() else {
            continue;
        };
        for id in &bucket.response_ids {
            owner.entry(id.as_str()).or_insert(representative.as_str());
        }
    }
    owner
}

/// Agreement for each consolidated bucket, in input order.
///
/// Votes on any member id resolve to the bucket, keyed by its
/// representative id. A voter counts once per bucket: their latest vote
/// across all member ids wins. Buckets without members are skipped.
pub fn agreement_for_buckets(
    buckets: &[SemanticBucket],
    votes: &[FeedbackVote],
) -> Vec<StatementAgreement> {
    let owner = member_owners(buckets);
    let resolved: Vec<FeedbackVote> = votes
        .iter()
        .filter(|vote| owner.contains_key(vote.statement_id.as_str()))
        .cloned()
        .collect();
    let resolved = resolve_to_representatives(buckets, &resolved);
    let live = latest_votes(&resolved);

    let mut by_bucket: HashMap<&str, Vec<&FeedbackVote>> = HashMap::new();
    for vote in &live {
        by_bucket
            .entry(vote.statement_id.as_str())
            .or_default()
            .push(vote);
    }

    buckets
        .iter()
        .filter_map(SemanticBucket::representative_id)
        .map(|rep| {
            let votes = by_bucket.get(rep.as_str()).map(Vec::as_slice).unwrap_or_default();
            StatementAgreement::tally(rep.to_string(), votes.iter().copied())
        })
        .collect()
}
