//! Export job handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use clipforge_models::{ClipCapture, JobId, JobStatusView, ProjectId, RenderSettingsRequest};
use clipforge_pipeline::{CreateJobRequest, RateLimitedAction};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::handlers::{check_id, validate_body};
use crate::state::AppState;

/// Segment the client captured for this clip only.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    #[validate(length(min = 1, max = 1024))]
    pub storage_ref: String,
    #[validate(range(exclusive_min = 0.0))]
    pub duration: Option<f64>,
    #[validate(length(min = 1, max = 16))]
    pub format: Option<String>,
}

impl From<CaptureRequest> for ClipCapture {
    fn from(req: CaptureRequest) -> Self {
        ClipCapture {
            storage_ref: req.storage_ref,
            duration: req.duration,
            format: req.format.unwrap_or_else(|| "mp4".to_string()),
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportRequest {
    #[validate(length(min = 1, max = 64))]
    pub clip_id: String,
    #[serde(default)]
    pub settings: RenderSettingsRequest,
    #[validate(nested)]
    pub capture: Option<CaptureRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

/// Create an export job for one clip. Returns as soon as the job is queued.
pub async fn create_export(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(request): Json<CreateExportRequest>,
) -> ApiResult<(StatusCode, Json<JobStatusView>)> {
    check_id("project", &project_id)?;
    validate_body(&request)?;
    state
        .pipeline
        .limiter
        .check(RateLimitedAction::Export, &user.uid)?;

    let job = state
        .pipeline
        .jobs
        .create_job(
            &user.uid,
            &ProjectId::from_string(project_id),
            CreateJobRequest {
                clip_id: request.clip_id,
                settings: request.settings,
                capture: request.capture.map(ClipCapture::from),
            },
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(job.to_status_view())))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<JobStatusView>> {
    check_id("job", &job_id)?;
    let view = state
        .pipeline
        .jobs
        .get_job_status(&user.uid, &JobId::from_string(job_id))
        .await?;
    Ok(Json(view))
}

pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<JobStatusView>> {
    check_id("job", &job_id)?;
    state
        .pipeline
        .limiter
        .check(RateLimitedAction::Export, &user.uid)?;
    let job = state
        .pipeline
        .jobs
        .retry_job(&user.uid, &JobId::from_string(job_id))
        .await?;
    Ok(Json(job.to_status_view()))
}

pub async fn get_download_url(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<DownloadUrlResponse>> {
    check_id("job", &job_id)?;
    let url = state
        .pipeline
        .jobs
        .download_url(&user.uid, &JobId::from_string(job_id))
        .await?;
    Ok(Json(DownloadUrlResponse {
        url,
        expires_in_secs: state.pipeline.config.presign_ttl.as_secs(),
    }))
}
