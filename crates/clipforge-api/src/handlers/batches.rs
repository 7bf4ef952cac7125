//! Batch export handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use clipforge_models::{BatchClipUpdate, BatchId, BatchStatusView, ProjectId};
use clipforge_pipeline::RateLimitedAction;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::{check_id, validate_body};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 50))]
    pub clip_ids: Vec<String>,
}

pub async fn create_batch(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(request): Json<CreateBatchRequest>,
) -> ApiResult<(StatusCode, Json<BatchStatusView>)> {
    check_id("project", &project_id)?;
    validate_body(&request)?;
    state
        .pipeline
        .limiter
        .check(RateLimitedAction::Batch, &user.uid)?;

    let batch = state
        .pipeline
        .batches
        .create_batch(&user.uid, &ProjectId::from_string(project_id), request.clip_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(batch.to_status_view())))
}

/// The newest batch still processing for a project, or `null`.
pub async fn get_pending_batch(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<Option<BatchStatusView>>> {
    check_id("project", &project_id)?;
    let view = state
        .pipeline
        .batches
        .get_pending_batch(&user.uid, &ProjectId::from_string(project_id))
        .await?;
    Ok(Json(view))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<BatchStatusView>> {
    check_id("batch", &batch_id)?;
    let batch = state
        .pipeline
        .batches
        .get_batch(&user.uid, &BatchId::from_string(batch_id))
        .await?;
    Ok(Json(batch.to_status_view()))
}

pub async fn update_batch_clip(
    State(state): State<AppState>,
    Path((batch_id, clip_id)): Path<(String, String)>,
    user: AuthUser,
    Json(update): Json<BatchClipUpdate>,
) -> ApiResult<Json<BatchStatusView>> {
    check_id("batch", &batch_id)?;
    check_id("clip", &clip_id)?;
    let batch = state
        .pipeline
        .batches
        .update_batch_clip(&user.uid, &BatchId::from_string(batch_id), &clip_id, &update)
        .await?;
    Ok(Json(batch.to_status_view()))
}

pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<BatchStatusView>> {
    check_id("batch", &batch_id)?;
    let batch = state
        .pipeline
        .batches
        .cancel_batch(&user.uid, &BatchId::from_string(batch_id))
        .await?;
    Ok(Json(batch.to_status_view()))
}
