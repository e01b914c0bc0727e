//! Pipeline metrics.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_COMPLETED_TOTAL: &str = "vscribe_runs_completed_total";
    pub const RUNS_FAILED_TOTAL: &str = "vscribe_runs_failed_total";
    pub const CUES_PLACED_TOTAL: &str = "vscribe_cues_placed_total";
    pub const DEGRADED_PLACEMENTS_TOTAL: &str = "vscribe_degraded_placements_total";
    pub const SYNTHESIS_RETRIES_TOTAL: &str = "vscribe_synthesis_retries_total";
}

/// Record a completed recomposition run.
pub fn record_run_completed() {
    counter!(names::RUNS_COMPLETED_TOTAL).increment(1);
}

/// Record a failed recomposition run.
pub fn record_run_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::RUNS_FAILED_TOTAL, &labels).increment(1);
}

/// Record placed cues, split by whether placement was degraded.
pub fn record_placements(total: usize, degraded: usize) {
    counter!(names::CUES_PLACED_TOTAL).increment(total as u64);
    if degraded > 0 {
        counter!(names::DEGRADED_PLACEMENTS_TOTAL).increment(degraded as u64);
    }
}

/// Record a retried synthesis attempt.
pub fn record_synthesis_retry() {
    counter!(names::SYNTHESIS_RETRIES_TOTAL).increment(1);
}
