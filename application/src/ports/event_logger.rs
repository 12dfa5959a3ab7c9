//! Port for structured analysis logging.
//!
//! Defines the [`AnalysisEventLogger`] trait for recording analysis events
//! (consolidation prompts, raw model output, rejected ids, job ownership
//! changes) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port keeps a
//! machine-readable audit trail (JSONL) of what the model was asked and
//! what was thrown away.

use serde_json::Value;

/// A structured analysis event for logging.
pub struct AnalysisEvent {
    /// Event type identifier (e.g., "consolidation_request", "job_claimed").
    pub event_type: &'static str,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl AnalysisEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging analysis events to a structured log.
///
/// `log` is synchronous and infallible: a broken log must never fail an
/// analysis run.
pub trait AnalysisEventLogger: Send + Sync {
    fn log(&self, event: AnalysisEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoAnalysisLogger;

impl AnalysisEventLogger for NoAnalysisLogger {
    fn log(&self, _event: AnalysisEvent) {}
}
