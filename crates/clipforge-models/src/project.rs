//! Project model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::clip::{Clip, ClipAiData};
use crate::error::{ModelError, ModelResult};
use crate::id::ProjectId;
use crate::preset::PlatformPreset;
use crate::render::RenderSettingsRequest;
use crate::source::{SourceAsset, UploadedVideo};

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Created,
    Analyzing,
    Analyzed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Created => "created",
            ProjectStatus::Analyzing => "analyzing",
            ProjectStatus::Analyzed => "analyzed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the source video was provided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoReference {
    /// Identifier understood by the metadata provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Direct upload, if the project was created from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadedVideo>,
}

/// Overall result of the last analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_assessment: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub used_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub enriched: bool,
    pub transcript_available: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// A user's long-form video and its discovered clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,

    pub video: VideoReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<f64>,

    /// Canonical source asset; immutable once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_asset: Option<SourceAsset>,

    pub platform_preset: PlatformPreset,

    /// Sorted by start time, mutually non-overlapping
    #[serde(default)]
    pub clips: Vec<Clip>,

    #[serde(default)]
    pub clip_settings: HashMap<String, RenderSettingsRequest>,

    #[serde(default)]
    pub clip_ai_data: HashMap<String, ClipAiData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisSummary>,

    #[serde(default)]
    pub status: ProjectStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        video: VideoReference,
        platform_preset: PlatformPreset,
    ) -> Self {
        let now = Utc::now();
        let video_duration = video.upload.as_ref().and_then(|u| u.duration);
        Self {
            id: ProjectId::new(),
            user_id: user_id.into(),
            title: title.into(),
            channel_name: None,
            video,
            video_duration,
            source_asset: None,
            platform_preset,
            clips: Vec::new(),
            clip_settings: HashMap::new(),
            clip_ai_data: HashMap::new(),
            analysis: None,
            status: ProjectStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_channel_name(mut self, channel_name: Option<String>) -> Self {
        self.channel_name = channel_name;
        self
    }

    /// Storage prefix owning every object of this project.
    pub fn storage_prefix(&self) -> String {
        format!("users/{}/projects/{}/", self.user_id, self.id)
    }

    /// Replace the clip list, keeping it ordered by start time.
    pub fn set_clips(&mut self, mut clips: Vec<Clip>) {
        clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        self.clips = clips;
        self.updated_at = Utc::now();
    }

    /// Clips ordered by score, highest first.
    pub fn clips_by_score(&self) -> Vec<Clip> {
        let mut clips = self.clips.clone();
        clips.sort_by(|a, b| b.score.cmp(&a.score));
        clips
    }

    pub fn find_clip(&self, clip_id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == clip_id)
    }

    /// Attach the canonical source asset. Fails if one is already set.
    pub fn attach_source_asset(&mut self, asset: SourceAsset) -> ModelResult<()> {
        if self.source_asset.is_some() {
            return Err(ModelError::SourceAssetAlreadyAttached(self.id.to_string()));
        }
        if self.video_duration.is_none() && asset.duration > 0.0 {
            self.video_duration = Some(asset.duration);
        }
        self.source_asset = Some(asset);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
