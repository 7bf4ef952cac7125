//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use clipforge_discovery::{
    ClipDiscovery, ContentGenerator, DiscoveryConfig, GeminiClient, HttpMetadataProvider,
    VideoMetadataProvider, ViralityScorer,
};
use clipforge_pipeline::{Pipeline, PipelineConfig};
use clipforge_render_client::HttpRenderDispatcher;
use clipforge_storage::{MemoryObjectStore, ObjectStore, R2Client};
use clipforge_store::{
    FirestoreBatchRepository, FirestoreClient, FirestoreJobRepository, FirestoreProjectRepository,
    Repositories,
};

use crate::auth::JwtVerifier;
use crate::config::{ApiConfig, ObjectStoreBackend, StoreBackend};

pub type StateError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Pipeline,
    pub storage: Arc<dyn ObjectStore>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: Pipeline, storage: Arc<dyn ObjectStore>) -> Result<Self, StateError> {
        let secret = config.jwt_secret.as_deref().ok_or("JWT_SECRET must be set")?;
        let jwt = Arc::new(JwtVerifier::new(secret));
        Ok(Self {
            config,
            pipeline,
            storage,
            jwt,
        })
    }

    /// Build every backend from environment variables.
    pub async fn from_env(config: ApiConfig) -> Result<Self, StateError> {
        let repos = match config.store_backend {
            StoreBackend::Memory => {
                warn!("Using in-memory record store; data is lost on restart");
                Repositories::in_memory()
            }
            StoreBackend::Firestore => {
                let client = FirestoreClient::from_env().await?;
                Repositories {
                    projects: Arc::new(FirestoreProjectRepository::new(client.clone())),
                    jobs: Arc::new(FirestoreJobRepository::new(client.clone())),
                    batches: Arc::new(FirestoreBatchRepository::new(client)),
                }
            }
        };

        let storage: Arc<dyn ObjectStore> = match config.object_store_backend {
            ObjectStoreBackend::Memory => {
                warn!("Using in-memory object store; uploads are lost on restart");
                Arc::new(MemoryObjectStore::new())
            }
            ObjectStoreBackend::R2 => Arc::new(R2Client::from_env()?),
        };

        let dispatcher = Arc::new(HttpRenderDispatcher::from_env()?);
        if dispatcher.config().endpoint.is_none() {
            warn!("RENDER_WORKER_URL not set; export jobs will stay queued");
        }

        let (generator, scorer): (Option<Arc<dyn ContentGenerator>>, Option<Arc<dyn ViralityScorer>>) =
            match GeminiClient::from_env() {
                Ok(client) => {
                    let client = Arc::new(client);
                    let generator: Arc<dyn ContentGenerator> = client.clone();
                    let scorer: Arc<dyn ViralityScorer> = client;
                    (Some(generator), Some(scorer))
                }
                Err(e) => {
                    warn!("Content generation disabled, analysis will use fallback clips: {}", e);
                    (None, None)
                }
            };
        let discovery = Arc::new(ClipDiscovery::new(generator, scorer, DiscoveryConfig::from_env()));

        let metadata: Option<Arc<dyn VideoMetadataProvider>> = match HttpMetadataProvider::from_env() {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                warn!("Video metadata provider disabled: {}", e);
                None
            }
        };

        let pipeline_config = PipelineConfig::from_env();
        info!(
            max_projects_per_user = pipeline_config.max_projects_per_user,
            stale_detection = pipeline_config.stale_job_timeout.is_some(),
            "Pipeline configured"
        );
        let pipeline = Pipeline::new(
            repos,
            Arc::clone(&storage),
            dispatcher,
            discovery,
            metadata,
            pipeline_config,
        );

        Self::new(config, pipeline, storage)
    }
}
