//! Model-level validation errors.

use thiserror::Error;

/// Errors raised when a model operation would break an invariant.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid platform preset: {0}")]
    InvalidPreset(String),

    #[error("Source asset already attached to project {0}")]
    SourceAssetAlreadyAttached(String),

    #[error("Clip {clip_id} is not part of batch {batch_id}")]
    UnknownBatchClip { batch_id: String, clip_id: String },

    #[error("A batch export needs at least one clip")]
    EmptyBatch,
}

impl ModelError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn invalid_time_range(msg: impl Into<String>) -> Self {
        Self::InvalidTimeRange(msg.into())
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
