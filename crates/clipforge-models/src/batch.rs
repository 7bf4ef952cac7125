//! Batch export model.
//!
//! A batch tracks the jobs created by one "export selected clips" action. Its
//! aggregate status is always derived from the sub-record counts, except for
//! `cancelled`, which only the user can set.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::id::{BatchId, JobId, ProjectId};
use crate::job::{JobStatus, ProcessingJob};

/// Aggregate batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Processing,
    Partial,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    /// Derive the aggregate status from clip counts.
    pub fn derive(total: u32, completed: u32, failed: u32) -> Self {
        if completed == total {
            BatchStatus::Completed
        } else if failed == total {
            BatchStatus::Failed
        } else if completed + failed == total {
            BatchStatus::Partial
        } else {
            BatchStatus::Processing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Partial => "partial",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::Processing)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of one clip inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchClipStatus {
    #[default]
    Pending,
    Capturing,
    Processing,
    Completed,
    Failed,
}

impl BatchClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchClipStatus::Pending => "pending",
            BatchClipStatus::Capturing => "capturing",
            BatchClipStatus::Processing => "processing",
            BatchClipStatus::Completed => "completed",
            BatchClipStatus::Failed => "failed",
        }
    }

    /// Sub-records the coordinator refreshes from their job on read.
    pub fn needs_reconcile(&self) -> bool {
        matches!(self, BatchClipStatus::Processing | BatchClipStatus::Capturing)
    }
}

impl From<JobStatus> for BatchClipStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued | JobStatus::Processing => BatchClipStatus::Processing,
            JobStatus::Completed => BatchClipStatus::Completed,
            JobStatus::Failed => BatchClipStatus::Failed,
        }
    }
}

/// Per-clip sub-record mirroring part of a processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchClip {
    pub clip_id: String,
    pub job_id: Option<JobId>,
    pub status: BatchClipStatus,
    pub progress: u8,
    pub output_ref: Option<String>,
    pub error: Option<String>,
}

impl BatchClip {
    pub fn pending(clip_id: impl Into<String>) -> Self {
        Self {
            clip_id: clip_id.into(),
            job_id: None,
            status: BatchClipStatus::Pending,
            progress: 0,
            output_ref: None,
            error: None,
        }
    }

    /// Copy authoritative job state into this sub-record. Returns whether anything changed.
    pub fn sync_from_job(&mut self, job: &ProcessingJob) -> bool {
        let before = self.clone();
        self.job_id = Some(job.id.clone());
        self.status = job.status.into();
        self.progress = job.progress;
        self.output_ref = job.output_ref.clone();
        self.error = job.error.clone();
        *self != before
    }
}

/// Partial update of one batch sub-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchClipUpdate {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub status: Option<BatchClipStatus>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub output_ref: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Aggregate tracking record for one multi-clip export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchExport {
    pub id: BatchId,
    pub user_id: String,
    pub project_id: ProjectId,
    pub clips: Vec<BatchClip>,
    pub total_clips: u32,
    pub completed_clips: u32,
    pub failed_clips: u32,
    pub status: BatchStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchExport {
    /// Create a batch with one pending sub-record per clip.
    pub fn new(
        user_id: impl Into<String>,
        project_id: ProjectId,
        clip_ids: Vec<String>,
    ) -> ModelResult<Self> {
        if clip_ids.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        let now = Utc::now();
        let clips: Vec<BatchClip> = clip_ids.into_iter().map(BatchClip::pending).collect();
        Ok(Self {
            id: BatchId::new(),
            user_id: user_id.into(),
            project_id,
            total_clips: clips.len() as u32,
            clips,
            completed_clips: 0,
            failed_clips: 0,
            status: BatchStatus::Processing,
            started_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    /// Recount terminal sub-records and re-derive the aggregate status.
    ///
    /// A cancelled batch keeps its status; counts still refresh.
    pub fn recompute(&mut self) {
        self.completed_clips = self
            .clips
            .iter()
            .filter(|c| c.status == BatchClipStatus::Completed)
            .count() as u32;
        self.failed_clips = self
            .clips
            .iter()
            .filter(|c| c.status == BatchClipStatus::Failed)
            .count() as u32;

        if self.status != BatchStatus::Cancelled {
            self.status = BatchStatus::derive(self.total_clips, self.completed_clips, self.failed_clips);
        }
        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
    }

    /// Merge an update into one sub-record, then recompute.
    pub fn apply_clip_update(&mut self, clip_id: &str, update: &BatchClipUpdate) -> ModelResult<()> {
        let clip = self
            .clips
            .iter_mut()
            .find(|c| c.clip_id == clip_id)
            .ok_or_else(|| ModelError::UnknownBatchClip {
                batch_id: self.id.to_string(),
                clip_id: clip_id.to_string(),
            })?;

        if let Some(job_id) = &update.job_id {
            clip.job_id = Some(job_id.clone());
        }
        if let Some(status) = update.status {
            clip.status = status;
        }
        if let Some(progress) = update.progress {
            clip.progress = progress.min(100);
        }
        if let Some(output_ref) = &update.output_ref {
            clip.output_ref = Some(output_ref.clone());
        }
        if let Some(error) = &update.error {
            clip.error = Some(error.clone());
        }

        self.recompute();
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.status = BatchStatus::Cancelled;
        self.recompute();
    }

    /// Whether a client should keep watching this batch.
    pub fn is_pending(&self) -> bool {
        self.status == BatchStatus::Processing
    }

    pub fn to_status_view(&self) -> BatchStatusView {
        BatchStatusView {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            status: self.status,
            total_clips: self.total_clips,
            completed_clips: self.completed_clips,
            failed_clips: self.failed_clips,
            clips: self.clips.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read schema for batch polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusView {
    pub id: BatchId,
    pub project_id: ProjectId,
    pub status: BatchStatus,
    pub total_clips: u32,
    pub completed_clips: u32,
    pub failed_clips: u32,
    pub clips: Vec<BatchClip>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> BatchExport {
        let ids = (0..n).map(|i| format!("clip_{i}")).collect();
        BatchExport::new("u1", ProjectId::from_string("p1"), ids).unwrap()
    }

    fn set(batch: &mut BatchExport, clip: usize, status: BatchClipStatus) {
        batch
            .apply_clip_update(
                &format!("clip_{clip}"),
                &BatchClipUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(BatchStatus::derive(3, 3, 0), BatchStatus::Completed);
        assert_eq!(BatchStatus::derive(3, 0, 3), BatchStatus::Failed);
        assert_eq!(BatchStatus::derive(3, 2, 1), BatchStatus::Partial);
        assert_eq!(BatchStatus::derive(3, 2, 0), BatchStatus::Processing);
        assert_eq!(BatchStatus::derive(3, 0, 0), BatchStatus::Processing);
    }

    #[test]
    fn test_new_batch_is_pending() {
        let batch = batch(3);
        assert_eq!(batch.total_clips, 3);
        assert!(batch.clips.iter().all(|c| c.status == BatchClipStatus::Pending));
        assert!(batch.is_pending());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let result = BatchExport::new("u1", ProjectId::from_string("p1"), vec![]);
        assert_eq!(result.unwrap_err(), ModelError::EmptyBatch);
    }

    #[test]
    fn test_partial_aggregate() {
        let mut batch = batch(3);
        set(&mut batch, 0, BatchClipStatus::Completed);
        set(&mut batch, 1, BatchClipStatus::Completed);
        assert_eq!(batch.status, BatchStatus::Processing);
        set(&mut batch, 2, BatchClipStatus::Failed);
        assert_eq!(batch.completed_clips, 2);
        assert_eq!(batch.failed_clips, 1);
        assert_eq!(batch.status, BatchStatus::Partial);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_unknown_clip_update() {
        let mut batch = batch(1);
        let err = batch
            .apply_clip_update("nope", &BatchClipUpdate::default())
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownBatchClip { .. }));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let mut batch = batch(2);
        batch.cancel();
        set(&mut batch, 0, BatchClipStatus::Completed);
        set(&mut batch, 1, BatchClipStatus::Completed);
        assert_eq!(batch.status, BatchStatus::Cancelled);
        assert_eq!(batch.completed_clips, 2);
    }

    #[test]
    fn test_job_status_maps_to_clip_status() {
        assert_eq!(BatchClipStatus::from(JobStatus::Queued), BatchClipStatus::Processing);
        assert_eq!(BatchClipStatus::from(JobStatus::Failed), BatchClipStatus::Failed);
    }
}
