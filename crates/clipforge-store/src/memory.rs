//! In-memory repositories.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use clipforge_models::{BatchExport, BatchId, JobId, JobStatus, ProcessingJob, Project, ProjectId};

use crate::error::{StoreError, StoreResult};
use crate::repository::{BatchRepository, JobRepository, JobVersion, ProjectRepository};

#[derive(Default)]
pub struct MemoryProjectRepository {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl MemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn get(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(project_id)
            .filter(|p| p.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let projects = self.projects.read().await;
        let mut owned: Vec<Project> = projects
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }

    async fn create(&self, project: &Project) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(StoreError::already_exists(format!("projects/{}", project.id)));
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn save(&self, project: &Project) -> StoreResult<()> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<()> {
        let mut projects = self.projects.write().await;
        if projects.get(project_id).is_some_and(|p| p.user_id == user_id) {
            projects.remove(project_id);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: RwLock<HashMap<JobId, ProcessingJob>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<ProcessingJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn create(&self, job: &ProcessingJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::already_exists(format!("jobs/{}", job.id)));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn save(&self, job: &ProcessingJob) -> StoreResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn save_if_unchanged(&self, job: &ProcessingJob, expected: JobVersion) -> StoreResult<bool> {
        let mut jobs = self.jobs.write().await;
        if jobs.get(&job.id).map(JobVersion::of) != Some(expected) {
            return Ok(false);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(true)
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<ProcessingJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<ProcessingJob> = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct MemoryBatchRepository {
    batches: RwLock<HashMap<BatchId, BatchExport>>,
}

impl MemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepository for MemoryBatchRepository {
    async fn get(&self, batch_id: &BatchId) -> StoreResult<Option<BatchExport>> {
        Ok(self.batches.read().await.get(batch_id).cloned())
    }

    async fn create(&self, batch: &BatchExport) -> StoreResult<()> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.id) {
            return Err(StoreError::already_exists(format!("batches/{}", batch.id)));
        }
        batches.insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn save(&self, batch: &BatchExport) -> StoreResult<()> {
        self.batches
            .write()
            .await
            .insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn find_latest_for_project(
        &self,
        user_id: &str,
        project_id: &ProjectId,
    ) -> StoreResult<Option<BatchExport>> {
        let batches = self.batches.read().await;
        Ok(batches
            .values()
            .filter(|b| b.user_id == user_id && &b.project_id == project_id)
            .max_by(|a, b| a.started_at.cmp(&b.started_at))
            .cloned())
    }
}
