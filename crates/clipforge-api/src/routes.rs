//! API routes.

use axum::middleware;
use axum::routing::{get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    analyze_project, attach_source_asset, cancel_batch, create_batch, create_export, create_project,
    create_upload_url, delete_project, get_batch, get_download_url, get_job, get_pending_batch,
    get_project, health, list_projects, ready, report_job_status, retry_job, save_clip_settings,
    update_batch_clip,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let project_routes = Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/:project_id", get(get_project).delete(delete_project))
        .route("/projects/:project_id/analyze", post(analyze_project))
        .route("/projects/:project_id/source-asset", post(attach_source_asset))
        .route(
            "/projects/:project_id/clips/:clip_id/settings",
            put(save_clip_settings),
        )
        // Exports and batches scoped to a project
        .route("/projects/:project_id/exports", post(create_export))
        .route("/projects/:project_id/batches", post(create_batch))
        .route("/projects/:project_id/batches/pending", get(get_pending_batch));

    let job_routes = Router::new()
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/retry", post(retry_job))
        .route("/jobs/:job_id/download-url", get(get_download_url));

    let batch_routes = Router::new()
        .route("/batches/:batch_id", get(get_batch))
        .route("/batches/:batch_id/clips/:clip_id", patch(update_batch_clip))
        .route("/batches/:batch_id/cancel", post(cancel_batch));

    let api_routes = Router::new()
        .merge(project_routes)
        .merge(job_routes)
        .merge(batch_routes)
        .route("/uploads", post(create_upload_url));

    // Render worker callbacks, authenticated by shared credential
    let internal_routes = Router::new().route("/jobs/:job_id/status", post(report_job_status));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .nest("/internal", internal_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
