//! Render worker callbacks.

use axum::extract::{Path, State};
use axum::Json;

use clipforge_models::{JobId, JobStatusView, WorkerUpdate};

use crate::auth::WorkerAuth;
use crate::error::ApiResult;
use crate::handlers::check_id;
use crate::state::AppState;

/// Status report from the render worker.
pub async fn report_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    _worker: WorkerAuth,
    Json(update): Json<WorkerUpdate>,
) -> ApiResult<Json<JobStatusView>> {
    check_id("job", &job_id)?;
    let job = state
        .pipeline
        .jobs
        .apply_worker_update(&JobId::from_string(job_id), &update)
        .await?;
    Ok(Json(job.to_status_view()))
}
