//! Firestore-backed repositories.
//!
//! Layout:
//! - `users/{uid}/projects/{projectId}`
//! - `jobs/{jobId}`
//! - `batches/{batchId}`

use async_trait::async_trait;
use tracing::{debug, info, warn};

use clipforge_models::{BatchExport, BatchId, JobId, JobStatus, ProcessingJob, Project, ProjectId};

use crate::client::FirestoreClient;
use crate::error::{StoreError, StoreResult};
use crate::repository::{BatchRepository, JobRepository, JobVersion, ProjectRepository};
use crate::types::{Direction, Document, StructuredQuery, Value};

const JOBS_COLLECTION: &str = "jobs";
const BATCHES_COLLECTION: &str = "batches";

fn projects_collection(user_id: &str) -> String {
    format!("users/{}/projects", user_id)
}

fn decode_all<T: for<'de> serde::Deserialize<'de>>(docs: Vec<Document>) -> StoreResult<Vec<T>> {
    docs.iter().map(Document::to_record).collect()
}

pub struct FirestoreProjectRepository {
    client: FirestoreClient,
}

impl FirestoreProjectRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProjectRepository for FirestoreProjectRepository {
    async fn get(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>> {
        let doc = self
            .client
            .get_document(&projects_collection(user_id), project_id.as_str())
            .await?;
        doc.map(|d| d.to_record()).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<Project>> {
        let docs = self
            .client
            .list_all_documents(&projects_collection(user_id))
            .await?;
        let mut projects: Vec<Project> = decode_all(docs)?;
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn create(&self, project: &Project) -> StoreResult<()> {
        let doc = Document::from_record(project)?;
        self.client
            .create_document(&projects_collection(&project.user_id), project.id.as_str(), &doc)
            .await?;
        info!(project_id = %project.id, user_id = %project.user_id, "Created project record");
        Ok(())
    }

    async fn save(&self, project: &Project) -> StoreResult<()> {
        let doc = Document::from_record(project)?;
        self.client
            .set_document(&projects_collection(&project.user_id), project.id.as_str(), &doc)
            .await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, project_id: &ProjectId) -> StoreResult<()> {
        self.client
            .delete_document(&projects_collection(user_id), project_id.as_str())
            .await
    }
}

pub struct FirestoreJobRepository {
    client: FirestoreClient,
}

impl FirestoreJobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for FirestoreJobRepository {
    async fn get(&self, job_id: &JobId) -> StoreResult<Option<ProcessingJob>> {
        let doc = self.client.get_document(JOBS_COLLECTION, job_id.as_str()).await?;
        doc.map(|d| d.to_record()).transpose()
    }

    async fn create(&self, job: &ProcessingJob) -> StoreResult<()> {
        let doc = Document::from_record(job)?;
        self.client
            .create_document(JOBS_COLLECTION, job.id.as_str(), &doc)
            .await?;
        Ok(())
    }

    async fn save(&self, job: &ProcessingJob) -> StoreResult<()> {
        let doc = Document::from_record(job)?;
        self.client.set_document(JOBS_COLLECTION, job.id.as_str(), &doc).await?;
        Ok(())
    }

    async fn save_if_unchanged(&self, job: &ProcessingJob, expected: JobVersion) -> StoreResult<bool> {
        let Some(current) = self.client.get_document(JOBS_COLLECTION, job.id.as_str()).await? else {
            return Ok(false);
        };
        let stored: ProcessingJob = current.to_record()?;
        if JobVersion::of(&stored) != expected {
            return Ok(false);
        }
        let update_time = current.update_time.as_deref().ok_or_else(|| {
            StoreError::invalid_response(format!("{}/{} has no updateTime", JOBS_COLLECTION, job.id))
        })?;

        let doc = Document::from_record(job)?;
        match self
            .client
            .update_document_with_precondition(JOBS_COLLECTION, job.id.as_str(), &doc, update_time)
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed(_)) | Err(StoreError::NotFound(_)) => {
                debug!(job_id = %job.id, "Job changed before conditional save");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_by_status(&self, status: JobStatus, limit: usize) -> StoreResult<Vec<ProcessingJob>> {
        let query = StructuredQuery::field_equals(
            JOBS_COLLECTION,
            "status",
            Value::StringValue(status.as_str().to_string()),
        )
        .order_by("updated_at", Direction::Ascending)
        .with_limit(i32::try_from(limit).unwrap_or(i32::MAX));
        let docs = self.client.run_query("", query).await?;

        let mut jobs = Vec::with_capacity(docs.len());
        for doc in &docs {
            match doc.to_record::<ProcessingJob>() {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(
                    document = doc.name.as_deref().unwrap_or("unknown"),
                    error = %e,
                    "Skipping undecodable job document"
                ),
            }
        }
        Ok(jobs)
    }
}

pub struct FirestoreBatchRepository {
    client: FirestoreClient,
}

impl FirestoreBatchRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BatchRepository for FirestoreBatchRepository {
    async fn get(&self, batch_id: &BatchId) -> StoreResult<Option<BatchExport>> {
        let doc = self
            .client
            .get_document(BATCHES_COLLECTION, batch_id.as_str())
            .await?;
        doc.map(|d| d.to_record()).transpose()
    }

    async fn create(&self, batch: &BatchExport) -> StoreResult<()> {
        let doc = Document::from_record(batch)?;
        self.client
            .create_document(BATCHES_COLLECTION, batch.id.as_str(), &doc)
            .await?;
        Ok(())
    }

    async fn save(&self, batch: &BatchExport) -> StoreResult<()> {
        let doc = Document::from_record(batch)?;
        self.client
            .set_document(BATCHES_COLLECTION, batch.id.as_str(), &doc)
            .await?;
        Ok(())
    }

    async fn find_latest_for_project(
        &self,
        user_id: &str,
        project_id: &ProjectId,
    ) -> StoreResult<Option<BatchExport>> {
        let query = StructuredQuery::field_equals(
            BATCHES_COLLECTION,
            "project_id",
            Value::StringValue(project_id.to_string()),
        );
        let docs = self.client.run_query("", query).await?;
        let batches: Vec<BatchExport> = decode_all(docs)?;
        Ok(batches
            .into_iter()
            .filter(|b| b.user_id == user_id)
            .max_by(|a, b| a.started_at.cmp(&b.started_at)))
    }
}
