//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const PROJECTS_CREATED_TOTAL: &str = "clipforge_projects_created_total";
    pub const PROJECTS_EVICTED_TOTAL: &str = "clipforge_projects_evicted_total";
    pub const ANALYSIS_RUNS_TOTAL: &str = "clipforge_analysis_runs_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "clipforge_analysis_duration_seconds";
    pub const JOBS_CREATED_TOTAL: &str = "clipforge_jobs_created_total";
    pub const JOB_TRANSITIONS_TOTAL: &str = "clipforge_job_transitions_total";
    pub const DISPATCH_TOTAL: &str = "clipforge_dispatch_total";
    pub const STALE_JOBS_TOTAL: &str = "clipforge_stale_jobs_total";
    pub const BATCHES_CREATED_TOTAL: &str = "clipforge_batches_created_total";
    pub const BATCHES_FINALIZED_TOTAL: &str = "clipforge_batches_finalized_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "clipforge_rate_limit_hits_total";
}

pub fn record_project_created() {
    counter!(names::PROJECTS_CREATED_TOTAL).increment(1);
}

pub fn record_project_evicted() {
    counter!(names::PROJECTS_EVICTED_TOTAL).increment(1);
}

pub fn record_analysis(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ANALYSIS_RUNS_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_created(quality: &str) {
    counter!(names::JOBS_CREATED_TOTAL, "quality" => quality.to_string()).increment(1);
}

pub fn record_job_transition(status: &str) {
    counter!(names::JOB_TRANSITIONS_TOTAL, "status" => status.to_string()).increment(1);
}

/// `trigger` is "create", "retry" or "sweep"; `outcome` is "ok" or "error".
pub fn record_dispatch(trigger: &str, outcome: &str) {
    let labels = [("trigger", trigger.to_string()), ("outcome", outcome.to_string())];
    counter!(names::DISPATCH_TOTAL, &labels).increment(1);
}

pub fn record_stale_jobs(count: usize) {
    counter!(names::STALE_JOBS_TOTAL).increment(count as u64);
}

pub fn record_batch_created(clips: usize) {
    counter!(names::BATCHES_CREATED_TOTAL).increment(1);
    histogram!("clipforge_batch_size").record(clips as f64);
}

pub fn record_batch_finalized(status: &str) {
    counter!(names::BATCHES_FINALIZED_TOTAL, "status" => status.to_string()).increment(1);
}

pub fn record_rate_limit_hit(action: &str) {
    counter!(names::RATE_LIMIT_HITS_TOTAL, "action" => action.to_string()).increment(1);
}
