//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Service unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Map an HTTP status and body to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            412 => Self::PreconditionFailed(message),
            429 => Self::RateLimited(1000),
            500..=599 => Self::Unavailable { status, message },
            _ => Self::RequestFailed { status, message },
        }
    }

    /// HTTP status equivalent, used for request metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::PreconditionFailed(_) => Some(412),
            Self::RateLimited(_) => Some(429),
            Self::Unavailable { status, .. } | Self::RequestFailed { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidResponse(_) | Self::SerializationError(_) | Self::Json(_) => None,
        }
    }

    /// Server-requested backoff, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_) | StoreError::RateLimited(_) | StoreError::Unavailable { .. }
        )
    }
}
