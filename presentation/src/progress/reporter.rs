//! Progress reporting for analysis runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sensemaker_application::AnalysisProgressNotifier;
use sensemaker_domain::AnalysisPhase;
use std::sync::Mutex;

/// Reports progress with one indicatif bar per phase
pub struct ProgressReporter {
    phase_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            phase_bar: Mutex::new(None),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisProgressNotifier for ProgressReporter {
    fn on_phase_start(&self, phase: AnalysisPhase, total_tasks: usize) {
        // Only consolidation has countable steps; the rest spin
        let pb = if phase == AnalysisPhase::Consolidation && total_tasks > 0 {
            let pb = ProgressBar::new(total_tasks as u64);
            pb.set_style(Self::phase_style());
            pb
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            pb
        };
        pb.set_prefix(phase.display_name());
        pb.set_message("Starting...");

        if let Ok(mut slot) = self.phase_bar.lock() {
            *slot = Some(pb);
        }
    }

    fn on_cluster_consolidated(&self, cluster_index: usize, buckets: usize, degraded: bool) {
        if let Ok(slot) = self.phase_bar.lock()
            && let Some(pb) = slot.as_ref()
        {
            let status = if degraded {
                format!("{} cluster {} (fallback)", "!".yellow(), cluster_index + 1)
            } else {
                format!(
                    "{} cluster {} -> {} statements",
                    "v".green(),
                    cluster_index + 1,
                    buckets
                )
            };
            pb.set_message(status);
            pb.inc(1);
        }
    }

    fn on_phase_complete(&self, phase: AnalysisPhase) {
        if let Ok(mut slot) = self.phase_bar.lock()
            && let Some(pb) = slot.take()
        {
            pb.finish_with_message(format!("{} done", phase.as_str().green()));
        }
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl AnalysisProgressNotifier for SimpleProgress {
    fn on_phase_start(&self, phase: AnalysisPhase, total_tasks: usize) {
        if total_tasks > 0 {
            eprintln!(
                "{} {} ({} tasks)",
                "->".cyan(),
                phase.display_name().bold(),
                total_tasks
            );
        } else {
            eprintln!("{} {}", "->".cyan(), phase.display_name().bold());
        }
    }

    fn on_cluster_consolidated(&self, cluster_index: usize, buckets: usize, degraded: bool) {
        if degraded {
            eprintln!("  {} cluster {} (fallback)", "x".red(), cluster_index + 1);
        } else {
            eprintln!(
                "  {} cluster {}: {} statements",
                "v".green(),
                cluster_index + 1,
                buckets
            );
        }
    }

    fn on_phase_complete(&self, _phase: AnalysisPhase) {}
}
