//! Clip export pipeline services.
//!
//! This crate provides:
//! - Project creation with per-user eviction, analysis orchestration and source attachment
//! - Export-time source resolution
//! - The export job manager and its dispatch sweeper
//! - The batch export coordinator
//! - Per-user action rate limiting

pub mod batches;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod projects;
pub mod rate_limit;
pub mod source;
pub mod sweeper;

use std::sync::Arc;

use clipforge_discovery::{ClipDiscovery, VideoMetadataProvider};
use clipforge_render_client::RenderDispatcher;
use clipforge_storage::ObjectStore;
use clipforge_store::Repositories;

pub use batches::BatchCoordinator;
pub use config::{ActionQuota, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use jobs::{CreateJobRequest, JobManager};
pub use logging::JobLogger;
pub use projects::{NewProject, ProjectService, UploadTarget, UploadUrl};
pub use rate_limit::{ActionRateLimiter, RateLimitedAction};
pub use source::{ensure_owned_ref, resolve_source};
pub use sweeper::{DispatchSweeper, SweepReport};

/// All pipeline services sharing one set of backends.
#[derive(Clone)]
pub struct Pipeline {
    pub projects: Arc<ProjectService>,
    pub jobs: Arc<JobManager>,
    pub batches: Arc<BatchCoordinator>,
    pub limiter: Arc<ActionRateLimiter>,
    pub config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        repos: Repositories,
        storage: Arc<dyn ObjectStore>,
        dispatcher: Arc<dyn RenderDispatcher>,
        discovery: Arc<ClipDiscovery>,
        metadata: Option<Arc<dyn VideoMetadataProvider>>,
        config: PipelineConfig,
    ) -> Self {
        let projects = ProjectService::new(
            repos.clone(),
            Arc::clone(&storage),
            discovery,
            metadata,
            config.clone(),
        );
        let jobs = JobManager::new(repos.clone(), dispatcher, storage, config.clone());
        Self {
            projects: Arc::new(projects),
            jobs: Arc::new(jobs),
            batches: Arc::new(BatchCoordinator::new(repos)),
            limiter: Arc::new(ActionRateLimiter::new(&config)),
            config,
        }
    }

    /// Sweeper wired to this pipeline's job manager and rate limiter.
    pub fn sweeper(&self) -> DispatchSweeper {
        DispatchSweeper::new(Arc::clone(&self.jobs), &self.config)
            .with_rate_limiter(Arc::clone(&self.limiter))
    }
}
