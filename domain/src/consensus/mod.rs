//! Consensus aggregation over feedback votes

pub mod agreement;
pub mod metrics;
pub mod vote;

pub use agreement::{
    StatementAgreement, agreement_for_buckets, agreement_for_responses,
    resolve_to_representatives,
};
pub use metrics::{ConsensusMetrics, compute_consensus};
pub use vote::{FeedbackValue, FeedbackVote, latest_votes};
