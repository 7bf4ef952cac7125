//! Source asset types and export-time source resolution results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a stored video came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceProvenance {
    Uploaded,
    Capture,
    ServerDownload,
}

impl SourceProvenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceProvenance::Uploaded => "uploaded",
            SourceProvenance::Capture => "capture",
            SourceProvenance::ServerDownload => "server_download",
        }
    }
}

impl std::fmt::Display for SourceProvenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical durably-stored video for a project. Read-only once attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceAsset {
    pub storage_ref: String,
    pub duration: f64,
    pub format: String,
    pub captured_at: DateTime<Utc>,
    pub provenance: SourceProvenance,
}

/// A video file uploaded directly when the project was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadedVideo {
    pub storage_ref: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

/// A segment captured just in time for a single clip export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipCapture {
    pub storage_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default = "default_format")]
    pub format: String,
    pub captured_at: DateTime<Utc>,
}

fn default_format() -> String {
    "mp4".to_string()
}

/// Which priority tier produced a resolved source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    ClipCapture,
    ProjectAsset,
    DirectUpload,
}

/// Video source pinned on a job at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResolvedSource {
    pub storage_ref: String,
    pub provenance: SourceProvenance,
    pub origin: SourceOrigin,
}

impl ResolvedSource {
    pub fn from_capture(capture: &ClipCapture) -> Self {
        Self {
            storage_ref: capture.storage_ref.clone(),
            provenance: SourceProvenance::Capture,
            origin: SourceOrigin::ClipCapture,
        }
    }

    pub fn from_asset(asset: &SourceAsset) -> Self {
        Self {
            storage_ref: asset.storage_ref.clone(),
            provenance: asset.provenance,
            origin: SourceOrigin::ProjectAsset,
        }
    }

    pub fn from_upload(upload: &UploadedVideo) -> Self {
        Self {
            storage_ref: upload.storage_ref.clone(),
            provenance: SourceProvenance::Uploaded,
            origin: SourceOrigin::DirectUpload,
        }
    }
}
