//! Discovery error types.

use thiserror::Error;

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiscoveryError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn service_error(msg: impl Into<String>) -> Self {
        Self::ServiceError(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Timeout(_) | DiscoveryError::ServiceError(_) | DiscoveryError::Network(_)
        )
    }
}
