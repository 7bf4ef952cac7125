//! Batch export coordinator.
//!
//! Sub-record updates are read-modify-write on the whole batch record with
//! last-write-wins semantics: two concurrent updates to different clips of the
//! same batch may overwrite each other. Reads of a pending batch reconcile
//! in-flight sub-records from their jobs and finalize the batch lazily.

use std::collections::HashSet;

use tracing::info;

use clipforge_models::{BatchClipUpdate, BatchExport, BatchId, BatchStatus, BatchStatusView, ProjectId};
use clipforge_store::Repositories;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

pub struct BatchCoordinator {
    repos: Repositories,
}

impl BatchCoordinator {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Create a batch with one pending sub-record per distinct clip.
    pub async fn create_batch(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        clip_ids: Vec<String>,
    ) -> PipelineResult<BatchExport> {
        let project = self
            .repos
            .projects
            .get(user_id, project_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("project", project_id))?;

        let mut seen = HashSet::new();
        let clip_ids: Vec<String> = clip_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        if let Some(missing) = clip_ids.iter().find(|id| project.find_clip(id).is_none()) {
            return Err(PipelineError::not_found("clip", missing));
        }

        let batch = BatchExport::new(user_id, project.id.clone(), clip_ids)?;
        self.repos.batches.create(&batch).await?;

        metrics::record_batch_created(batch.clips.len());
        info!(
            batch_id = %batch.id,
            project_id = %project_id,
            total_clips = batch.total_clips,
            "Created batch export"
        );
        Ok(batch)
    }

    /// Batch owned by `user_id`.
    pub async fn get_batch(&self, user_id: &str, batch_id: &BatchId) -> PipelineResult<BatchExport> {
        self.repos
            .batches
            .get(batch_id)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| PipelineError::not_found("batch", batch_id))
    }

    /// Merge a partial update into one sub-record and re-derive the aggregate.
    pub async fn update_batch_clip(
        &self,
        user_id: &str,
        batch_id: &BatchId,
        clip_id: &str,
        update: &BatchClipUpdate,
    ) -> PipelineResult<BatchExport> {
        let mut batch = self.get_batch(user_id, batch_id).await?;
        let was_terminal = batch.status.is_terminal();

        batch.apply_clip_update(clip_id, update)?;
        self.repos.batches.save(&batch).await?;

        if !was_terminal && batch.status.is_terminal() {
            self.on_finalized(&batch);
        }
        Ok(batch)
    }

    /// Latest batch of a project that is still being watched, reconciled against its jobs.
    ///
    /// The call that finalizes the batch still returns it; later calls return `None`.
    pub async fn get_pending_batch(
        &self,
        user_id: &str,
        project_id: &ProjectId,
    ) -> PipelineResult<Option<BatchStatusView>> {
        let Some(mut batch) = self
            .repos
            .batches
            .find_latest_for_project(user_id, project_id)
            .await?
        else {
            return Ok(None);
        };
        if !batch.is_pending() {
            return Ok(None);
        }

        let mut changed = false;
        for clip in batch.clips.iter_mut().filter(|c| c.status.needs_reconcile()) {
            let Some(job_id) = clip.job_id.clone() else {
                continue;
            };
            match self.repos.jobs.get(&job_id).await? {
                Some(job) if job.user_id == user_id => changed |= clip.sync_from_job(&job),
                _ => {}
            }
        }

        if changed {
            batch.recompute();
            self.repos.batches.save(&batch).await?;
            if batch.status.is_terminal() {
                self.on_finalized(&batch);
            }
        }
        Ok(Some(batch.to_status_view()))
    }

    /// Stop tracking a batch. Render work already dispatched keeps running.
    pub async fn cancel_batch(&self, user_id: &str, batch_id: &BatchId) -> PipelineResult<BatchExport> {
        let mut batch = self.get_batch(user_id, batch_id).await?;
        if !batch.is_pending() {
            if batch.status == BatchStatus::Cancelled {
                return Ok(batch);
            }
            return Err(PipelineError::invalid_request(format!(
                "batch {} already finished as {}",
                batch_id, batch.status
            )));
        }

        batch.cancel();
        self.repos.batches.save(&batch).await?;
        self.on_finalized(&batch);
        Ok(batch)
    }

    fn on_finalized(&self, batch: &BatchExport) {
        metrics::record_batch_finalized(batch.status.as_str());
        info!(
            batch_id = %batch.id,
            status = %batch.status,
            completed = batch.completed_clips,
            failed = batch.failed_clips,
            total = batch.total_clips,
            "Batch export finalized"
        );
    }
}
