//! Export job manager.
//!
//! Jobs are persisted `queued` before dispatch. Dispatch is an outbound task
//! whose failure leaves the job `queued`; the dispatch sweeper picks it up
//! again later.
//!
//! Every transition of an existing job is a conditional save against the
//! status and `updated_at` that were read, so the sweeper and worker
//! callbacks never overwrite each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use clipforge_models::{
    ClipCapture, JobId, JobStatus, JobStatusView, ProcessingJob, ProjectId, RenderSettingsRequest,
    WorkerUpdate,
};
use clipforge_render_client::RenderDispatcher;
use clipforge_storage::ObjectStore;
use clipforge_store::{JobVersion, Repositories};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::source::{ensure_owned_ref, resolve_source};

/// Worker updates re-read and re-apply this many times when they lose a race.
const WORKER_UPDATE_ATTEMPTS: usize = 3;

/// Export request for one clip.
#[derive(Debug, Clone, Default)]
pub struct CreateJobRequest {
    pub clip_id: String,
    /// Overrides merged over the clip's saved settings
    pub settings: RenderSettingsRequest,
    /// Segment captured for this clip only
    pub capture: Option<ClipCapture>,
}

pub struct JobManager {
    repos: Repositories,
    dispatcher: Arc<dyn RenderDispatcher>,
    storage: Arc<dyn ObjectStore>,
    config: PipelineConfig,
}

impl JobManager {
    pub fn new(
        repos: Repositories,
        dispatcher: Arc<dyn RenderDispatcher>,
        storage: Arc<dyn ObjectStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repos,
            dispatcher,
            storage,
            config,
        }
    }

    /// Create a queued job for one clip and dispatch it without waiting.
    pub async fn create_job(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        request: CreateJobRequest,
    ) -> PipelineResult<ProcessingJob> {
        let project = self
            .repos
            .projects
            .get(user_id, project_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("project", project_id))?;
        let clip = project
            .find_clip(&request.clip_id)
            .ok_or_else(|| PipelineError::not_found("clip", &request.clip_id))?;

        let saved = project
            .clip_settings
            .get(&clip.id)
            .cloned()
            .unwrap_or_default();
        let settings = request.settings.merged_over(&saved).normalize(clip)?;
        if let Some(overlay) = &settings.overlay {
            ensure_owned_ref(user_id, &overlay.source_ref)?;
        }

        if let Some(capture) = &request.capture {
            ensure_owned_ref(user_id, &capture.storage_ref)?;
            if !self.storage.exists(&capture.storage_ref).await? {
                return Err(PipelineError::invalid_request(format!(
                    "capture '{}' has not been uploaded",
                    capture.storage_ref
                )));
            }
        }
        let source = resolve_source(&project, request.capture.as_ref())?;

        let mut job = ProcessingJob::new(user_id, project.id.clone(), clip.id.clone(), source, settings);
        job.mark_dispatched();
        self.repos.jobs.create(&job).await?;

        metrics::record_job_created(job.quality().as_str());
        info!(
            job_id = %job.id,
            project_id = %project.id,
            clip_id = %job.clip_id,
            origin = ?job.source.origin,
            quality = %job.quality().as_str(),
            "Created export job"
        );

        self.spawn_dispatch(job.id.clone(), "create");
        Ok(job)
    }

    /// Job owned by `user_id`.
    pub async fn get_job(&self, user_id: &str, job_id: &JobId) -> PipelineResult<ProcessingJob> {
        self.repos
            .jobs
            .get(job_id)
            .await?
            .filter(|job| job.user_id == user_id)
            .ok_or_else(|| PipelineError::not_found("job", job_id))
    }

    pub async fn get_job_status(&self, user_id: &str, job_id: &JobId) -> PipelineResult<JobStatusView> {
        Ok(self.get_job(user_id, job_id).await?.to_status_view())
    }

    /// Requeue a failed job and dispatch it again.
    pub async fn retry_job(&self, user_id: &str, job_id: &JobId) -> PipelineResult<ProcessingJob> {
        let mut job = self.get_job(user_id, job_id).await?;
        let expected = JobVersion::of(&job);
        job.reset_for_retry()?;
        job.mark_dispatched();
        if !self.repos.jobs.save_if_unchanged(&job, expected).await? {
            return Err(PipelineError::conflict(format!(
                "job {} changed while it was being retried",
                job_id
            )));
        }

        info!(job_id = %job.id, retry_count = job.retry_count, "Retrying export job");
        self.spawn_dispatch(job.id.clone(), "retry");
        Ok(job)
    }

    /// Apply a status report from the render worker.
    pub async fn apply_worker_update(
        &self,
        job_id: &JobId,
        update: &WorkerUpdate,
    ) -> PipelineResult<ProcessingJob> {
        let logger = JobLogger::new(job_id, "export");
        for _ in 0..WORKER_UPDATE_ATTEMPTS {
            let mut job = self
                .repos
                .jobs
                .get(job_id)
                .await?
                .ok_or_else(|| PipelineError::not_found("job", job_id))?;
            let expected = JobVersion::of(&job);

            if let Err(e) = job.apply_update(update) {
                logger.log_warning(&format!("rejected worker update: {}", e));
                return Err(e.into());
            }
            if !self.repos.jobs.save_if_unchanged(&job, expected).await? {
                debug!(job_id = %job_id, "Job changed under worker update, re-reading");
                continue;
            }
            metrics::record_job_transition(job.status.as_str());

            match job.status {
                JobStatus::Completed => logger.log_completion(job.output_ref.as_deref().unwrap_or("")),
                JobStatus::Failed => logger.log_error(job.error.as_deref().unwrap_or("render failed")),
                JobStatus::Processing => logger.log_progress(&format!("{}%", job.progress)),
                JobStatus::Queued => {}
            }
            return Ok(job);
        }

        logger.log_warning("worker update kept losing to concurrent writes");
        Err(PipelineError::conflict(format!(
            "job {} kept changing while applying a worker update",
            job_id
        )))
    }

    /// Temporary download link for a completed job's output.
    pub async fn download_url(&self, user_id: &str, job_id: &JobId) -> PipelineResult<String> {
        let job = self.get_job(user_id, job_id).await?;
        let output_ref = match (job.status, job.output_ref.as_deref()) {
            (JobStatus::Completed, Some(output_ref)) => output_ref,
            _ => {
                return Err(PipelineError::invalid_request(format!(
                    "job {} has no output yet",
                    job_id
                )))
            }
        };
        Ok(self.storage.presign_get(output_ref, self.config.presign_ttl).await?)
    }

    /// Dispatch again every queued job whose last attempt is older than the retry threshold.
    pub async fn redispatch_queued(&self, now: DateTime<Utc>) -> PipelineResult<usize> {
        let retry_after = chrono::Duration::seconds(self.config.dispatch_retry_after.as_secs() as i64);
        let threshold = now - retry_after;

        let queued = self
            .repos
            .jobs
            .list_by_status(JobStatus::Queued, self.config.sweep_batch_size)
            .await?;

        let mut redispatched = 0;
        for job in queued {
            if job.last_dispatched_at.is_some_and(|at| at > threshold) {
                continue;
            }

            let Some(mut current) = self.repos.jobs.get(&job.id).await? else {
                continue;
            };
            if current.status != JobStatus::Queued {
                continue;
            }

            let expected = JobVersion::of(&current);
            current.mark_dispatched();
            if !self.repos.jobs.save_if_unchanged(&current, expected).await? {
                debug!(job_id = %current.id, "Job changed before re-dispatch, skipping");
                continue;
            }
            warn!(
                job_id = %current.id,
                dispatch_attempts = current.dispatch_attempts,
                "Re-dispatching queued job"
            );
            dispatch(self.dispatcher.as_ref(), &current.id, "sweep").await;
            redispatched += 1;
        }
        Ok(redispatched)
    }

    /// Fail processing jobs that reported nothing for longer than `timeout`.
    pub async fn expire_stale(&self, now: DateTime<Utc>, timeout: std::time::Duration) -> PipelineResult<usize> {
        let timeout_secs = timeout.as_secs() as i64;
        let processing = self
            .repos
            .jobs
            .list_by_status(JobStatus::Processing, self.config.sweep_batch_size)
            .await?;

        let mut expired = 0;
        for candidate in processing.into_iter().filter(|j| j.is_stale(timeout_secs, now)) {
            let Some(mut job) = self.repos.jobs.get(&candidate.id).await? else {
                continue;
            };
            if !job.is_stale(timeout_secs, now) {
                continue;
            }
            let expected = JobVersion::of(&job);
            let last_update = job.updated_at;
            job.mark_stale();
            if !self.repos.jobs.save_if_unchanged(&job, expected).await? {
                debug!(job_id = %job.id, "Job reported progress before expiry, skipping");
                continue;
            }
            warn!(
                job_id = %job.id,
                last_update = %last_update,
                "Expired stale job (no progress)"
            );
            expired += 1;
        }

        if expired > 0 {
            metrics::record_stale_jobs(expired);
        }
        Ok(expired)
    }

    fn spawn_dispatch(&self, job_id: JobId, trigger: &'static str) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatch(dispatcher.as_ref(), &job_id, trigger).await;
        });
    }
}

/// Send one dispatch. Failures are logged; the job stays as persisted.
async fn dispatch(dispatcher: &dyn RenderDispatcher, job_id: &JobId, trigger: &'static str) {
    match dispatcher.dispatch(job_id).await {
        Ok(()) => metrics::record_dispatch(trigger, "ok"),
        Err(e) => {
            metrics::record_dispatch(trigger, "error");
            warn!(
                job_id = %job_id,
                trigger,
                retryable = e.is_retryable(),
                error = %e,
                "Render dispatch failed, job stays queued"
            );
        }
    }
}
