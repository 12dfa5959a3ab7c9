//! Conversation-level participation metrics

use super::vote::{FeedbackVote, latest_votes};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Read-only aggregate over all live votes of a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMetrics {
    pub total_votes: usize,
    pub unique_voters: usize,
    pub total_statements: usize,
    pub total_participants: usize,
    /// Share of participants who voted at least once
    pub participant_voting_percent: u32,
    /// Share of the voter × statement grid actually filled
    pub vote_coverage_percent: u32,
}

/// Compute participation metrics.
///
/// Participants are response authors plus voters. Votes on statements not
/// in `statement_ids` are ignored, and only the latest vote per
/// `(statement, voter)` counts.
pub fn compute_consensus<'a>(
    statement_ids: &[String],
    author_ids: impl IntoIterator<Item = &'a str>,
    votes: &[FeedbackVote],
) -> ConsensusMetrics {
    let statements: HashSet<&str> = statement_ids.iter().map(String::as_str).collect();
    let live: Vec<FeedbackVote> = latest_votes(
        votes
            .iter()
            .filter(|v| statements.contains(v.statement_id.as_str())),
    );

    let voters: HashSet<&str> = live.iter().map(|v| v.voter_id.as_str()).collect();
    let mut participants: HashSet<&str> = author_ids.into_iter().collect();
    participants.extend(voters.iter().copied());

    let total_votes = live.len();
    let unique_voters = voters.len();
    let total_statements = statements.len();

    ConsensusMetrics {
        total_votes,
        unique_voters,
        total_statements,
        total_participants: participants.len(),
        participant_voting_percent: percent(unique_voters, participants.len()),
        vote_coverage_percent: percent(total_votes, unique_voters * total_statements),
    }
}

/// Rounded percentage, 0 when `whole` is 0.
pub(crate) fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_participants_is_zero() {
        let metrics = compute_consensus(&[], std::iter::empty(), &[]);
        assert_eq!(metrics, ConsensusMetrics::default());
    }

    #[test]
    fn test_participation_counts_authors_and_voters() {
        let statements = ids(&["s1", "s2"]);
        let votes = vec![
            FeedbackVote::agree("s1", "alice", 1),
            FeedbackVote::agree("s2", "alice", 1),
            FeedbackVote::disagree("s1", "carol", 1),
        ];

        // alice and bob wrote responses, carol only voted
        let metrics = compute_consensus(&statements, ["alice", "bob"], &votes);

        assert_eq!(metrics.total_votes, 3);
        assert_eq!(metrics.unique_voters, 2);
        assert_eq!(metrics.total_participants, 3);
        assert_eq!(metrics.participant_voting_percent, 67);
        // 3 of 2 voters x 2 statements
        assert_eq!(metrics.vote_coverage_percent, 75);
    }

    #[test]
    fn test_revoted_statement_counts_once() {
        let statements = ids(&["s1"]);
        let votes = vec![
            FeedbackVote::agree("s1", "alice", 1),
            FeedbackVote::disagree("s1", "alice", 2),
        ];
        let metrics = compute_consensus(&statements, ["alice"], &votes);
        assert_eq!(metrics.total_votes, 1);
        assert_eq!(metrics.vote_coverage_percent, 100);
    }

    #[test]
    fn test_votes_on_unknown_statements_ignored() {
        let statements = ids(&["s1"]);
        let votes = vec![FeedbackVote::agree("gone", "alice", 1)];
        let metrics = compute_consensus(&statements, ["bob"], &votes);
        assert_eq!(metrics.total_votes, 0);
        assert_eq!(metrics.unique_voters, 0);
        assert_eq!(metrics.participant_voting_percent, 0);
        assert_eq!(metrics.vote_coverage_percent, 0);
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 0), 0);
    }
}
