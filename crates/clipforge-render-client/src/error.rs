//! Render client error types.

use thiserror::Error;

pub type RenderClientResult<T> = Result<T, RenderClientError>;

#[derive(Debug, Error)]
pub enum RenderClientError {
    #[error("Render worker not configured")]
    NotConfigured,

    #[error("Render worker unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Dispatch rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RenderClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderClientError::ServiceUnavailable(_)
                | RenderClientError::Timeout(_)
                | RenderClientError::Network(_)
        )
    }
}
