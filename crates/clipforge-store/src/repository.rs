//! Repository traits.
//!
//! Writes are whole-record overwrites. Job transitions go through
//! [`JobRepository::save_if_unchanged`] so a concurrent writer is never
//! silently overwritten; other read-modify-write callers (batch clip updates)
//! get last-write-wins semantics.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clipforge_models::{BatchExport, BatchId, JobId, JobStatus, ProcessingJob, Project, ProjectId};

use crate::error::StoreResult;
use crate::memory::{MemoryBatchRepository, MemoryJobRepository, MemoryProjectRepository};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn get(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>>;

    /// All projects of a user, oldest first.
    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Project>>;

    /// Insert a new project. Fails with `AlreadyExists` on id collision.
    async fn create(&self, project: &Project) -> StoreResult<()>;

    async fn save(&self, project: &Project) -> StoreResult<()>;

    /// Delete a project. Deleting a missing project is not an error.
    async fn delete(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<()>;
}

/// The parts of a job record a conditional save compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobVersion {
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
}

impl JobVersion {
    pub fn of(job: &ProcessingJob) -> Self {
        Self {
            status: job.status,
            updated_at: job.updated_at,
        }
    }
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<ProcessingJob>>;

    async fn create(&self, job: &ProcessingJob) -> StoreResult<()>;

    async fn save(&self, job: &ProcessingJob) -> StoreResult<()>;

    /// Overwrite `job` only while the stored record still matches `expected`.
    ///
    /// Returns `false` without writing when the record changed since it was
    /// read, or no longer exists.
    async fn save_if_unchanged(&self, job: &ProcessingJob, expected: JobVersion) -> StoreResult<bool>;

    /// Jobs in a given status, oldest update first, at most `limit`.
    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<ProcessingJob>>;
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn get(&self, batch_id: &BatchId) -> StoreResult<Option<BatchExport>>;

    async fn create(&self, batch: &BatchExport) -> StoreResult<()>;

    async fn save(&self, batch: &BatchExport) -> StoreResult<()>;

    /// Most recently started batch of a project owned by `user_id`.
    async fn find_latest_for_project(
        &self,
        user_id: &str,
        project_id: &ProjectId,
    ) -> StoreResult<Option<BatchExport>>;
}

/// Handles to every repository, shared across services.
#[derive(Clone)]
pub struct Repositories {
    pub projects: Arc<dyn ProjectRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub batches: Arc<dyn BatchRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(MemoryProjectRepository::new()),
            jobs: Arc::new(MemoryJobRepository::new()),
            batches: Arc::new(MemoryBatchRepository::new()),
        }
    }
}
