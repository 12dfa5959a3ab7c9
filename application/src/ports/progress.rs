//! Progress notification port
//!
//! Defines the interface for reporting progress during an analysis run.

use sensemaker_domain::AnalysisPhase;

/// Callback for progress updates during an analysis run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait AnalysisProgressNotifier: Send + Sync {
    /// Called when a phase starts
    fn on_phase_start(&self, phase: AnalysisPhase, total_tasks: usize);

    /// Called when one cluster has been consolidated
    fn on_cluster_consolidated(&self, cluster_index: usize, buckets: usize, degraded: bool);

    /// Called when a phase completes
    fn on_phase_complete(&self, phase: AnalysisPhase);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl AnalysisProgressNotifier for NoProgress {
    fn on_phase_start(&self, _phase: AnalysisPhase, _total_tasks: usize) {}
    fn on_cluster_consolidated(&self, _cluster_index: usize, _buckets: usize, _degraded: bool) {}
    fn on_phase_complete(&self, _phase: AnalysisPhase) {}
}
