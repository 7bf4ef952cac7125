//! Processing job model.
//!
//! A job renders one clip. It is created `queued`; the render worker moves it to
//! `processing` and then `completed` or `failed`. Only a failed job may be reset
//! to `queued` for a retry.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::id::{JobId, ProjectId};
use crate::render::{OutputSpec, QualityTier, RenderSettings};
use crate::source::ResolvedSource;

/// Error recorded when a job is failed for lack of progress.
pub const STALE_JOB_ERROR: &str = "stale: no progress reported";

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for (re)dispatch to the render worker
    #[default]
    Queued,
    /// Render worker is working on it
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more worker updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Transitions the render worker is allowed to report.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => matches!(
                next,
                JobStatus::Processing | JobStatus::Completed | JobStatus::Failed
            ),
            JobStatus::Processing => next != JobStatus::Queued,
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status report sent by the render worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerUpdate {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tracked unit of work for rendering one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingJob {
    pub id: JobId,
    pub user_id: String,
    pub project_id: ProjectId,
    pub clip_id: String,

    /// Video source resolved when the job was created
    pub source: ResolvedSource,

    pub start_time: f64,
    pub end_time: f64,

    pub settings: RenderSettings,
    pub output: OutputSpec,

    pub status: JobStatus,

    /// Progress percentage (0-100)
    pub progress: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub dispatch_attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dispatched_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    /// Create a queued job. The time range is the trim window of `settings`.
    pub fn new(
        user_id: impl Into<String>,
        project_id: ProjectId,
        clip_id: impl Into<String>,
        source: ResolvedSource,
        settings: RenderSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            project_id,
            clip_id: clip_id.into(),
            source,
            start_time: settings.trim.start,
            end_time: settings.trim.end,
            output: settings.quality.output_spec(),
            settings,
            status: JobStatus::Queued,
            progress: 0,
            output_ref: None,
            error: None,
            retry_count: 0,
            dispatch_attempts: 0,
            last_dispatched_at: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn quality(&self) -> QualityTier {
        self.settings.quality
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a dispatch attempt.
    pub fn mark_dispatched(&mut self) {
        self.dispatch_attempts += 1;
        self.last_dispatched_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Apply a status report from the render worker.
    pub fn apply_update(&mut self, update: &WorkerUpdate) -> ModelResult<()> {
        if !self.status.can_transition_to(update.status) {
            return Err(ModelError::invalid_transition(self.status, update.status));
        }

        let now = Utc::now();
        self.status = update.status;
        match update.status {
            JobStatus::Completed => {
                self.progress = 100;
                self.error = None;
                self.completed_at = Some(now);
            }
            JobStatus::Failed => {
                if let Some(progress) = update.progress {
                    self.progress = progress.min(100);
                }
                self.error = Some(
                    update
                        .error
                        .clone()
                        .unwrap_or_else(|| "render failed".to_string()),
                );
                self.completed_at = Some(now);
            }
            JobStatus::Processing | JobStatus::Queued => {
                if let Some(progress) = update.progress {
                    self.progress = progress.min(100);
                }
            }
        }
        if let Some(output_ref) = &update.output_ref {
            self.output_ref = Some(output_ref.clone());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Reset a failed job for another attempt.
    pub fn reset_for_retry(&mut self) -> ModelResult<()> {
        if self.status != JobStatus::Failed {
            return Err(ModelError::invalid_transition(self.status, JobStatus::Queued));
        }
        self.status = JobStatus::Queued;
        self.error = None;
        self.progress = 0;
        self.output_ref = None;
        self.completed_at = None;
        self.retry_count += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a processing job has gone without updates for longer than `timeout_secs`.
    pub fn is_stale(&self, timeout_secs: i64, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Processing && (now - self.updated_at).num_seconds() > timeout_secs
    }

    /// Fail a job that stopped reporting progress.
    pub fn mark_stale(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.error = Some(STALE_JOB_ERROR.to_string());
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn to_status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id.clone(),
            clip_id: self.clip_id.clone(),
            status: self.status,
            progress: self.progress,
            quality: self.settings.quality,
            output_ref: self.output_ref.clone(),
            error: self.error.clone(),
            retry_count: self.retry_count,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read schema for job status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: JobId,
    pub clip_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub quality: QualityTier,
    pub output_ref: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Clip;
    use crate::render::RenderSettingsRequest;
    use crate::source::{SourceOrigin, SourceProvenance};

    fn job() -> ProcessingJob {
        let clip = Clip::new(10.0, 40.0, 70);
        let settings = RenderSettingsRequest::default().normalize(&clip).unwrap();
        let source = ResolvedSource {
            storage_ref: "users/u1/projects/p1/source.mp4".into(),
            provenance: SourceProvenance::ServerDownload,
            origin: SourceOrigin::ProjectAsset,
        };
        ProcessingJob::new("u1", ProjectId::from_string("p1"), clip.id, source, settings)
    }

    fn update(status: JobStatus) -> WorkerUpdate {
        WorkerUpdate {
            status,
            progress: None,
            output_ref: None,
            error: None,
        }
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.start_time, 10.0);
        assert_eq!(job.end_time, 40.0);
        assert_eq!(job.output.height, 1920);
    }

    #[test]
    fn test_worker_lifecycle() {
        let mut job = job();
        job.apply_update(&WorkerUpdate {
            progress: Some(140),
            ..update(JobStatus::Processing)
        })
        .unwrap();
        assert_eq!(job.progress, 100);

        job.apply_update(&WorkerUpdate {
            progress: Some(40),
            ..update(JobStatus::Processing)
        })
        .unwrap();
        assert_eq!(job.progress, 40);

        job.apply_update(&WorkerUpdate {
            output_ref: Some("out.mp4".into()),
            ..update(JobStatus::Completed)
        })
        .unwrap();
        assert_eq!(job.progress, 100);
        assert_eq!(job.output_ref.as_deref(), Some("out.mp4"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_job_rejects_updates() {
        let mut job = job();
        job.apply_update(&update(JobStatus::Completed)).unwrap();
        assert!(job.apply_update(&update(JobStatus::Processing)).is_err());
        assert!(job.apply_update(&update(JobStatus::Failed)).is_err());
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut job = job();
        assert!(job.reset_for_retry().is_err());

        job.apply_update(&WorkerUpdate {
            error: Some("ffmpeg exited 1".into()),
            ..update(JobStatus::Failed)
        })
        .unwrap();
        assert_eq!(job.error.as_deref(), Some("ffmpeg exited 1"));

        job.reset_for_retry().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.retry_count, 1);
        assert!(job.error.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_stale_detection() {
        let mut job = job();
        let later = job.updated_at + chrono::Duration::seconds(600);
        assert!(!job.is_stale(300, later));

        job.apply_update(&update(JobStatus::Processing)).unwrap();
        let later = job.updated_at + chrono::Duration::seconds(600);
        assert!(job.is_stale(300, later));
        assert!(!job.is_stale(900, later));

        job.mark_stale();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(STALE_JOB_ERROR));
    }

    #[test]
    fn test_status_view_uses_camel_case() {
        let view = job().to_status_view();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["quality"], "standard");
        assert!(json["outputRef"].is_null());
        assert!(json["completedAt"].is_null());
        assert!(json.get("clipId").is_some());
    }
}
