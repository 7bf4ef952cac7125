//! API error types.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use clipforge_discovery::DiscoveryError;
use clipforge_models::ModelError;
use clipforge_pipeline::PipelineError;
use clipforge_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The export has nothing to render from.
    #[error("{0}")]
    NoVideoSource(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NoVideoSource(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::NoVideoSource(_) => "NO_VIDEO_SOURCE",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PipelineError::NoVideoSource(_) => ApiError::NoVideoSource(err.to_string()),
            PipelineError::DurationUnknown(_) => ApiError::Unprocessable(err.to_string()),
            PipelineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            PipelineError::Conflict(msg) => ApiError::Conflict(msg),
            PipelineError::RateLimited { retry_after_secs, .. } => ApiError::RateLimited { retry_after_secs },
            PipelineError::Model(e) => e.into(),
            PipelineError::Store(e) => e.into(),
            PipelineError::Storage(e) => ApiError::Internal(e.to_string()),
            PipelineError::Discovery(DiscoveryError::VideoNotFound(id)) => {
                ApiError::NotFound(format!("video {}", id))
            }
            PipelineError::Discovery(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidTransition { .. } | ModelError::SourceAssetAlreadyAttached(_) => {
                ApiError::Conflict(err.to_string())
            }
            ModelError::UnknownBatchClip { .. } => ApiError::NotFound(err.to_string()),
            _ => ApiError::Validation(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::PreconditionFailed(_) => ApiError::Conflict(err.to_string()),
            e if e.is_retryable() => ApiError::ServiceUnavailable(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) | ApiError::ServiceUnavailable(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default().to_lowercase() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };
        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
