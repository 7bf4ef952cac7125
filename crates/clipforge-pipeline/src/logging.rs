//! Structured logging helpers for export jobs and analysis runs.

use tracing::{error, info, warn};

/// Logger that tags every event with the job (or project) id and operation.
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    /// # Arguments
    /// * `job_id` - job id, or project id for analysis runs
    /// * `operation` - e.g. "export", "dispatch", "analysis"
    pub fn new(job_id: impl ToString, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = self.operation, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, operation = self.operation, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "Job completed: {}", message);
    }
}
