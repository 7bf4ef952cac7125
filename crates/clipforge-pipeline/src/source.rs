//! Export-time video source resolution.

use clipforge_models::{ClipCapture, Project, ResolvedSource};

use crate::error::{PipelineError, PipelineResult};

/// Pick the video a render job will read, in priority order:
/// a capture made for this clip, the project's source asset, the direct upload.
///
/// The capture is only pinned on the job; the project is never modified.
pub fn resolve_source(project: &Project, capture: Option<&ClipCapture>) -> PipelineResult<ResolvedSource> {
    if let Some(capture) = capture.filter(|c| !c.storage_ref.trim().is_empty()) {
        return Ok(ResolvedSource::from_capture(capture));
    }
    if let Some(asset) = project.source_asset.as_ref().filter(|a| !a.storage_ref.trim().is_empty()) {
        return Ok(ResolvedSource::from_asset(asset));
    }
    if let Some(upload) = project
        .video
        .upload
        .as_ref()
        .filter(|u| !u.storage_ref.trim().is_empty())
    {
        return Ok(ResolvedSource::from_upload(upload));
    }
    Err(PipelineError::NoVideoSource(project.id.to_string()))
}

/// Storage prefix every object of a user lives under.
pub fn user_prefix(user_id: &str) -> String {
    format!("users/{}/", user_id)
}

/// Reject storage references outside the caller's namespace.
pub fn ensure_owned_ref(user_id: &str, storage_ref: &str) -> PipelineResult<()> {
    if storage_ref.contains("..") || !storage_ref.starts_with(&user_prefix(user_id)) {
        return Err(PipelineError::invalid_request(format!(
            "storage reference '{}' is not owned by the caller",
            storage_ref
        )));
    }
    Ok(())
}
