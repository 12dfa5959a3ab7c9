//! Use cases (application services)

pub mod analysis_queue;
pub mod consolidate_clusters;
pub mod run_analysis;
