//! Analysis jobs and their exclusivity rules

pub mod entities;

pub use entities::{AnalysisJob, AnalysisStrategy, JobStatus, reclaim_cutoff};
