//! Feedback votes cast on statements

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// A participant's reaction to a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackValue {
    Agree,
    Pass,
    Disagree,
}

impl FeedbackValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackValue::Agree => "agree",
            FeedbackValue::Pass => "pass",
            FeedbackValue::Disagree => "disagree",
        }
    }
}

impl std::fmt::Display for FeedbackValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agree" | "1" => Ok(FeedbackValue::Agree),
            "pass" | "0" => Ok(FeedbackValue::Pass),
            "disagree" | "-1" => Ok(FeedbackValue::Disagree),
            other => Err(format!("unknown feedback value: {}", other)),
        }
    }
}

/// One row of feedback.
///
/// `timestamp` is milliseconds since the epoch; for a given
/// `(statement_id, voter_id)` pair only the latest vote is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackVote {
    pub statement_id: String,
    pub voter_id: String,
    pub value: FeedbackValue,
    pub timestamp: i64,
}

impl FeedbackVote {
    pub fn new(
        statement_id: impl Into<String>,
        voter_id: impl Into<String>,
        value: FeedbackValue,
        timestamp: i64,
    ) -> Self {
        Self {
            statement_id: statement_id.into(),
            voter_id: voter_id.into(),
            value,
            timestamp,
        }
    }

    pub fn agree(statement_id: &str, voter_id: &str, timestamp: i64) -> Self {
        Self::new(statement_id, voter_id, FeedbackValue::Agree, timestamp)
    }

    pub fn disagree(statement_id: &str, voter_id: &str, timestamp: i64) -> Self {
        Self::new(statement_id, voter_id, FeedbackValue::Disagree, timestamp)
    }

    pub fn pass(statement_id: &str, voter_id: &str, timestamp: i64) -> Self {
        Self::new(statement_id, voter_id, FeedbackValue::Pass, timestamp)
    }
}

/// Keep only the live vote for each `(statement_id, voter_id)` pair.
///
/// The latest timestamp wins; on a tie the vote appearing later in the
/// input wins. Output order follows first appearance of each pair.
pub fn latest_votes<'a>(votes: impl IntoIterator<Item = &'a FeedbackVote>) -> Vec<FeedbackVote> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut live: Vec<&FeedbackVote> = Vec::new();

    for vote in votes {
        let key = (vote.statement_id.as_str(), vote.voter_id.as_str());
        match index.get(&key) {
            Some(&i) if live[i].timestamp > vote.timestamp => {}
            Some(&i) => live[i] = vote,
            None => {
                index.insert(key, live.len());
                live.push(vote);
            }
        }
    }

    live.into_iter().cloned().collect()
}
