//! Project handlers: create, list, inspect, delete, analyze and source attachment.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use clipforge_models::{
    Platform, PlatformPreset, Project, ProjectId, ProjectStatus, RenderSettingsRequest, SourceAsset,
    SourceProvenance, UploadedVideo,
};
use clipforge_pipeline::{NewProject, RateLimitedAction};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{check_id, validate_body};
use crate::state::AppState;

/// Direct upload made before the project was created.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 1024))]
    pub storage_ref: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    pub size_bytes: Option<u64>,
    #[validate(range(exclusive_min = 0.0))]
    pub duration: Option<f64>,
}

/// Explicit duration window overriding the platform preset.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetRequest {
    pub min_duration: f64,
    pub max_duration: f64,
    pub target_duration: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub channel_name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub video_id: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
    #[validate(nested)]
    pub upload: Option<UploadRequest>,
    #[validate(range(exclusive_min = 0.0))]
    pub duration_seconds: Option<f64>,
    pub platform: Option<Platform>,
    pub preset: Option<PresetRequest>,
}

impl CreateProjectRequest {
    fn into_new_project(self) -> ApiResult<NewProject> {
        let platform_preset = match (self.preset, self.platform) {
            (Some(p), _) => Some(PlatformPreset::new(p.min_duration, p.max_duration, p.target_duration)?),
            (None, Some(platform)) => Some(PlatformPreset::for_platform(platform)),
            (None, None) => None,
        };
        let upload = self.upload.map(|u| UploadedVideo {
            storage_ref: u.storage_ref,
            filename: u.filename,
            size_bytes: u.size_bytes,
            duration: u.duration,
            uploaded_at: Utc::now(),
        });
        Ok(NewProject {
            title: self.title,
            channel_name: self.channel_name,
            video_id: self.video_id,
            video_url: self.video_url,
            upload,
            duration_seconds: self.duration_seconds,
            platform_preset,
        })
    }
}

/// Project list entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub title: String,
    pub status: ProjectStatus,
    pub clip_count: usize,
    pub has_source_asset: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            title: project.title.clone(),
            status: project.status,
            clip_count: project.clips.len(),
            has_source_asset: project.source_asset.is_some(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
}

/// Source asset captured or uploaded for a project.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SourceAssetRequest {
    #[validate(length(min = 1, max = 1024))]
    pub storage_ref: String,
    #[validate(range(exclusive_min = 0.0))]
    pub duration: f64,
    #[validate(length(min = 1, max = 16))]
    pub format: Option<String>,
    pub provenance: Option<SourceProvenance>,
}

impl From<SourceAssetRequest> for SourceAsset {
    fn from(req: SourceAssetRequest) -> Self {
        SourceAsset {
            storage_ref: req.storage_ref,
            duration: req.duration,
            format: req.format.unwrap_or_else(|| "mp4".to_string()),
            captured_at: Utc::now(),
            provenance: req.provenance.unwrap_or(SourceProvenance::Capture),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[validate(nested)]
    pub source_asset: Option<SourceAssetRequest>,
}

/// Project detail with clips ordered by score.
fn project_view(mut project: Project) -> Project {
    project.clips = project.clips_by_score();
    project
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    validate_body(&request)?;
    let project = state
        .pipeline
        .projects
        .create_project(&user.uid, request.into_new_project()?)
        .await?;
    info!(user_id = %user.uid, project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ProjectListResponse>> {
    let projects = state.pipeline.projects.list_projects(&user.uid).await?;
    Ok(Json(ProjectListResponse {
        projects: projects.iter().map(ProjectSummary::from).collect(),
    }))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<Project>> {
    check_id("project", &project_id)?;
    let project = state
        .pipeline
        .projects
        .get_project(&user.uid, &ProjectId::from_string(project_id))
        .await?;
    Ok(Json(project_view(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
) -> ApiResult<StatusCode> {
    check_id("project", &project_id)?;
    state
        .pipeline
        .projects
        .delete_project(&user.uid, &ProjectId::from_string(project_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run clip discovery. The body is optional.
pub async fn analyze_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
    body: Option<Json<AnalyzeRequest>>,
) -> ApiResult<Json<Project>> {
    check_id("project", &project_id)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    validate_body(&request)?;
    state
        .pipeline
        .limiter
        .check(RateLimitedAction::Analyze, &user.uid)?;

    let project = state
        .pipeline
        .projects
        .analyze_project(
            &user.uid,
            &ProjectId::from_string(project_id),
            request.source_asset.map(SourceAsset::from),
        )
        .await?;
    Ok(Json(project_view(project)))
}

pub async fn attach_source_asset(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    user: AuthUser,
    Json(request): Json<SourceAssetRequest>,
) -> ApiResult<Json<Project>> {
    check_id("project", &project_id)?;
    validate_body(&request)?;
    let project = state
        .pipeline
        .projects
        .attach_source_asset(&user.uid, &ProjectId::from_string(project_id), request.into())
        .await?;
    Ok(Json(project_view(project)))
}

pub async fn save_clip_settings(
    State(state): State<AppState>,
    Path((project_id, clip_id)): Path<(String, String)>,
    user: AuthUser,
    Json(settings): Json<RenderSettingsRequest>,
) -> ApiResult<Json<RenderSettingsRequest>> {
    check_id("project", &project_id)?;
    check_id("clip", &clip_id)?;
    let project = state
        .pipeline
        .projects
        .save_clip_settings(&user.uid, &ProjectId::from_string(project_id), &clip_id, settings)
        .await?;
    let saved = project
        .clip_settings
        .get(&clip_id)
        .cloned()
        .ok_or_else(|| ApiError::internal("clip settings were not saved"))?;
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_preset_wins_over_platform() {
        let request = CreateProjectRequest {
            title: None,
            channel_name: None,
            video_id: Some("abc".into()),
            video_url: None,
            upload: None,
            duration_seconds: None,
            platform: Some(Platform::InstagramReels),
            preset: Some(PresetRequest {
                min_duration: 20.0,
                max_duration: 40.0,
                target_duration: 30.0,
            }),
        };
        let new_project = request.into_new_project().unwrap();
        assert_eq!(new_project.platform_preset.unwrap().max_duration, 40.0);
    }

    #[test]
    fn test_invalid_preset_is_rejected() {
        let request = CreateProjectRequest {
            title: None,
            channel_name: None,
            video_id: Some("abc".into()),
            video_url: None,
            upload: None,
            duration_seconds: None,
            platform: None,
            preset: Some(PresetRequest {
                min_duration: 60.0,
                max_duration: 15.0,
                target_duration: 30.0,
            }),
        };
        assert!(matches!(request.into_new_project(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_video_url_must_be_a_url() {
        let request: CreateProjectRequest =
            serde_json::from_value(serde_json::json!({ "videoUrl": "not a url" })).unwrap();
        assert!(validate_body(&request).is_err());
    }
}
