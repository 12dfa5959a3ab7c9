//! Analysis run phases and the report they produce

pub mod phase;
pub mod report;

pub use phase::AnalysisPhase;
pub use report::{AnalysisReport, ClusteringSummary};
