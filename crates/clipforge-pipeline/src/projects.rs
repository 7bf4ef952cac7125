//! Project lifecycle: creation with eviction, analysis and source attachment.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use clipforge_discovery::{
    fetch_transcript_or_empty, AnalysisInput, ClipDiscovery, VideoDetails, VideoMetadataProvider,
};
use clipforge_models::{
    AnalysisSummary, PlatformPreset, Project, ProjectId, ProjectStatus, RenderSettingsRequest,
    SourceAsset, Transcript, UploadedVideo, VideoReference,
};
use clipforge_storage::ObjectStore;
use clipforge_store::Repositories;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::source::{ensure_owned_ref, user_prefix};

/// Input for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub title: Option<String>,
    pub channel_name: Option<String>,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub upload: Option<UploadedVideo>,
    pub duration_seconds: Option<f64>,
    pub platform_preset: Option<PlatformPreset>,
}

/// Where a presigned upload will land.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadTarget {
    /// Source video for a project that does not exist yet
    SourceVideo { filename: String },
    /// Just-in-time capture for one clip of an existing project
    ClipCapture { project_id: ProjectId, clip_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadUrl {
    pub storage_ref: String,
    pub upload_url: String,
    pub expires_in_secs: u64,
}

pub struct ProjectService {
    repos: Repositories,
    storage: Arc<dyn ObjectStore>,
    discovery: Arc<ClipDiscovery>,
    metadata: Option<Arc<dyn VideoMetadataProvider>>,
    config: PipelineConfig,
}

impl ProjectService {
    pub fn new(
        repos: Repositories,
        storage: Arc<dyn ObjectStore>,
        discovery: Arc<ClipDiscovery>,
        metadata: Option<Arc<dyn VideoMetadataProvider>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            repos,
            storage,
            discovery,
            metadata,
            config,
        }
    }

    /// Create a project, evicting the user's oldest projects first if at the cap.
    pub async fn create_project(&self, user_id: &str, request: NewProject) -> PipelineResult<Project> {
        let video_id = non_empty(request.video_id);
        let video_url = non_empty(request.video_url);
        if video_id.is_none() && video_url.is_none() && request.upload.is_none() {
            return Err(PipelineError::invalid_request(
                "a video id, video url or uploaded file is required",
            ));
        }
        let preset = request.platform_preset.unwrap_or_default();
        preset.validate()?;

        if let Some(upload) = &request.upload {
            self.check_stored_ref(user_id, &upload.storage_ref).await?;
        }

        let details = match &video_id {
            Some(id) => self.fetch_details(id).await,
            None => None,
        };

        let title = non_empty(request.title)
            .or_else(|| details.as_ref().map(|d| d.title.clone()))
            .or_else(|| request.upload.as_ref().map(|u| u.filename.clone()))
            .or_else(|| video_id.clone())
            .unwrap_or_else(|| "Untitled video".to_string());
        let channel_name = non_empty(request.channel_name)
            .or_else(|| details.as_ref().and_then(|d| d.channel_name.clone()));

        let video = VideoReference {
            video_id,
            video_url,
            upload: request.upload,
        };
        let mut project = Project::new(user_id, title, video, preset).with_channel_name(channel_name);
        let duration = request
            .duration_seconds
            .or(project.video_duration)
            .or_else(|| details.as_ref().map(|d| d.duration_seconds));
        project.video_duration = duration.filter(|d| d.is_finite() && *d > 0.0);

        self.evict_to_fit(user_id).await?;

        self.repos.projects.create(&project).await?;
        metrics::record_project_created();
        info!(user_id = %user_id, project_id = %project.id, "Created project");
        Ok(project)
    }

    /// Delete oldest projects until one more fits under the per-user cap.
    async fn evict_to_fit(&self, user_id: &str) -> PipelineResult<()> {
        let existing = self.repos.projects.list_for_user(user_id).await?;
        let max = self.config.max_projects_per_user.max(1);
        if existing.len() < max {
            return Ok(());
        }

        let excess = existing.len() + 1 - max;
        for oldest in existing.iter().take(excess) {
            info!(
                user_id = %user_id,
                project_id = %oldest.id,
                max_projects = max,
                "Evicting oldest project"
            );
            self.purge(oldest).await?;
            metrics::record_project_evicted();
        }
        Ok(())
    }

    pub async fn get_project(&self, user_id: &str, project_id: &ProjectId) -> PipelineResult<Project> {
        self.repos
            .projects
            .get(user_id, project_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("project", project_id))
    }

    /// Projects of a user, newest first.
    pub async fn list_projects(&self, user_id: &str) -> PipelineResult<Vec<Project>> {
        let mut projects = self.repos.projects.list_for_user(user_id).await?;
        projects.reverse();
        Ok(projects)
    }

    pub async fn delete_project(&self, user_id: &str, project_id: &ProjectId) -> PipelineResult<()> {
        let project = self.get_project(user_id, project_id).await?;
        self.purge(&project).await?;
        info!(user_id = %user_id, project_id = %project_id, "Deleted project");
        Ok(())
    }

    /// Remove stored objects first, then the record.
    async fn purge(&self, project: &Project) -> PipelineResult<()> {
        let prefix = project.storage_prefix();
        let mut deleted = self.storage.delete_prefix(&prefix).await?;

        if let Some(upload) = &project.video.upload {
            if !upload.storage_ref.starts_with(&prefix) {
                deleted += self.storage.delete_keys(&[upload.storage_ref.clone()]).await?;
            }
        }

        self.repos.projects.delete(&project.user_id, &project.id).await?;
        info!(project_id = %project.id, objects_deleted = deleted, "Purged project storage");
        Ok(())
    }

    /// Run clip discovery and store the result on the project.
    ///
    /// A supplied source asset is attached only when the project has none.
    pub async fn analyze_project(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        source_asset: Option<SourceAsset>,
    ) -> PipelineResult<Project> {
        let mut project = self.get_project(user_id, project_id).await?;
        let logger = JobLogger::new(project_id, "analysis");
        let started = Instant::now();
        logger.log_start(&project.title);

        if let Some(asset) = source_asset {
            if project.source_asset.is_none() {
                self.check_stored_ref(user_id, &asset.storage_ref).await?;
                project.attach_source_asset(asset)?;
                logger.log_progress("attached source asset");
            } else {
                logger.log_warning("project already has a source asset, ignoring the supplied one");
            }
        }

        project.set_status(ProjectStatus::Analyzing);
        self.repos.projects.save(&project).await?;

        let duration = match project.video_duration {
            Some(d) => Some(d),
            None => match project.video.video_id.clone() {
                Some(id) => self.fetch_details(&id).await.map(|d| d.duration_seconds),
                None => None,
            },
        }
        .filter(|d| d.is_finite() && *d > 0.0);

        let Some(duration) = duration else {
            project.set_status(ProjectStatus::Failed);
            self.repos.projects.save(&project).await?;
            logger.log_error("video duration unknown");
            metrics::record_analysis("failed", started.elapsed().as_secs_f64());
            return Err(PipelineError::DurationUnknown(project_id.to_string()));
        };
        project.video_duration = Some(duration);

        let transcript = self.fetch_transcript(&project).await;
        logger.log_progress(&format!("transcript segments: {}", transcript.segments().len()));

        let input = AnalysisInput {
            video_title: &project.title,
            channel_name: project.channel_name.as_deref(),
            video_duration: duration,
            transcript: &transcript,
            preset: &project.platform_preset,
        };
        let output = self.discovery.discover(&input).await;

        if let Some(reason) = &output.fallback_reason {
            logger.log_warning(&format!("used fallback clips: {}", reason));
        }

        let clip_count = output.clips.len();
        let used_fallback = output.used_fallback();
        project.analysis = Some(AnalysisSummary {
            overall_assessment: output.overall_assessment,
            topics: output.topics,
            used_fallback,
            fallback_reason: output.fallback_reason.map(|r| r.to_string()),
            enriched: output.enriched,
            transcript_available: !transcript.is_empty(),
            analyzed_at: Utc::now(),
        });
        project.clip_ai_data = output.ai_data;
        project.clip_settings.clear();
        project.set_clips(output.clips);
        project.set_status(ProjectStatus::Analyzed);
        self.repos.projects.save(&project).await?;

        let outcome = if used_fallback { "fallback" } else { "ai" };
        metrics::record_analysis(outcome, started.elapsed().as_secs_f64());
        logger.log_completion(&format!("{} clips ({})", clip_count, outcome));
        Ok(project)
    }

    /// Attach the canonical source asset. Fails if one is already attached.
    pub async fn attach_source_asset(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        asset: SourceAsset,
    ) -> PipelineResult<Project> {
        let mut project = self.get_project(user_id, project_id).await?;
        self.check_stored_ref(user_id, &asset.storage_ref).await?;
        project.attach_source_asset(asset)?;
        self.repos.projects.save(&project).await?;
        info!(
            project_id = %project_id,
            provenance = %project.source_asset.as_ref().map(|a| a.provenance.as_str()).unwrap_or_default(),
            "Attached source asset"
        );
        Ok(project)
    }

    /// Save per-clip render settings used as defaults for later exports.
    pub async fn save_clip_settings(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        clip_id: &str,
        settings: RenderSettingsRequest,
    ) -> PipelineResult<Project> {
        let mut project = self.get_project(user_id, project_id).await?;
        let clip = project
            .find_clip(clip_id)
            .ok_or_else(|| PipelineError::not_found("clip", clip_id))?;
        settings.normalize(clip)?;

        project.clip_settings.insert(clip_id.to_string(), settings);
        project.updated_at = Utc::now();
        self.repos.projects.save(&project).await?;
        Ok(project)
    }

    /// Presigned URL for uploading a source video or a clip capture.
    pub async fn create_upload_url(
        &self,
        user_id: &str,
        target: UploadTarget,
        content_type: &str,
    ) -> PipelineResult<UploadUrl> {
        let storage_ref = match target {
            UploadTarget::SourceVideo { filename } => format!(
                "{}uploads/{}-{}",
                user_prefix(user_id),
                Uuid::new_v4().simple(),
                sanitize_filename(&filename)
            ),
            UploadTarget::ClipCapture { project_id, clip_id } => {
                let project = self.get_project(user_id, &project_id).await?;
                if project.find_clip(&clip_id).is_none() {
                    return Err(PipelineError::not_found("clip", clip_id));
                }
                format!(
                    "{}captures/{}/{}.mp4",
                    project.storage_prefix(),
                    sanitize_filename(&clip_id),
                    Uuid::new_v4().simple()
                )
            }
        };

        let upload_url = self
            .storage
            .presign_put(&storage_ref, content_type, self.config.presign_ttl)
            .await?;
        Ok(UploadUrl {
            storage_ref,
            upload_url,
            expires_in_secs: self.config.presign_ttl.as_secs(),
        })
    }

    async fn check_stored_ref(&self, user_id: &str, storage_ref: &str) -> PipelineResult<()> {
        ensure_owned_ref(user_id, storage_ref)?;
        if !self.storage.exists(storage_ref).await? {
            return Err(PipelineError::invalid_request(format!(
                "no stored object at '{}'",
                storage_ref
            )));
        }
        Ok(())
    }

    async fn fetch_details(&self, video_id: &str) -> Option<VideoDetails> {
        let provider = self.metadata.as_ref()?;
        match provider.fetch_details(video_id).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(video_id = %video_id, error = %e, "Video details unavailable");
                None
            }
        }
    }

    async fn fetch_transcript(&self, project: &Project) -> Transcript {
        match (&self.metadata, &project.video.video_id) {
            (Some(provider), Some(video_id)) => {
                fetch_transcript_or_empty(
                    provider.as_ref(),
                    video_id,
                    self.discovery.config().transcript_timeout,
                )
                .await
            }
            _ => Transcript::empty(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Keep filenames to a safe single path segment.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.replace("..", "_").trim_matches('.').to_string();
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}
