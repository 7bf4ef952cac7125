//! Presigned upload URLs.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use clipforge_models::ProjectId;
use clipforge_pipeline::UploadTarget;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{check_id, validate_body};
use crate::state::AppState;

/// Either `filename` (new source video) or `projectId` plus `clipId` (clip capture).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255))]
    pub filename: Option<String>,
    pub project_id: Option<String>,
    pub clip_id: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub storage_ref: String,
    pub upload_url: String,
    pub expires_in_secs: u64,
}

impl UploadUrlRequest {
    fn target(self) -> ApiResult<UploadTarget> {
        match (self.project_id, self.clip_id, self.filename) {
            (Some(project_id), Some(clip_id), _) => {
                check_id("project", &project_id)?;
                check_id("clip", &clip_id)?;
                Ok(UploadTarget::ClipCapture {
                    project_id: ProjectId::from_string(project_id),
                    clip_id,
                })
            }
            (None, None, Some(filename)) => Ok(UploadTarget::SourceVideo { filename }),
            _ => Err(ApiError::bad_request(
                "Provide either filename, or projectId and clipId",
            )),
        }
    }
}

pub async fn create_upload_url(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<UploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    validate_body(&request)?;
    let content_type = request
        .content_type
        .clone()
        .unwrap_or_else(|| "video/mp4".to_string());
    if !content_type.starts_with("video/") {
        return Err(ApiError::Validation("contentType must be a video type".into()));
    }

    let upload = state
        .pipeline
        .projects
        .create_upload_url(&user.uid, request.target()?, &content_type)
        .await?;
    Ok(Json(UploadUrlResponse {
        storage_ref: upload.storage_ref,
        upload_url: upload.upload_url,
        expires_in_secs: upload.expires_in_secs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filename: Option<&str>, project: Option<&str>, clip: Option<&str>) -> UploadUrlRequest {
        UploadUrlRequest {
            filename: filename.map(String::from),
            project_id: project.map(String::from),
            clip_id: clip.map(String::from),
            content_type: None,
        }
    }

    #[test]
    fn test_upload_target() {
        assert!(matches!(
            request(Some("talk.mp4"), None, None).target(),
            Ok(UploadTarget::SourceVideo { .. })
        ));
        assert!(matches!(
            request(None, Some("p1"), Some("clip_1")).target(),
            Ok(UploadTarget::ClipCapture { .. })
        ));
        assert!(request(None, Some("p1"), None).target().is_err());
        assert!(request(None, None, None).target().is_err());
        assert!(request(None, Some("../p"), Some("clip_1")).target().is_err());
    }
}
