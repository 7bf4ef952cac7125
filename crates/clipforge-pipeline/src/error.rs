//! Pipeline error types.

use thiserror::Error;

use clipforge_discovery::DiscoveryError;
use clipforge_models::ModelError;
use clipforge_storage::StorageError;
use clipforge_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// No stored video can back an export.
    #[error("No video source available for project {0}; re-run analysis or re-upload the video")]
    NoVideoSource(String),

    #[error("Video duration unknown for project {0}")]
    DurationUnknown(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A concurrent writer changed the record first.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded for {action}, retry in {retry_after_secs}s")]
    RateLimited {
        action: &'static str,
        retry_after_secs: u64,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl PipelineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Store(e) => e.is_retryable(),
            PipelineError::Discovery(e) => e.is_retryable(),
            PipelineError::RateLimited { .. } | PipelineError::Conflict(_) => true,
            _ => false,
        }
    }
}
