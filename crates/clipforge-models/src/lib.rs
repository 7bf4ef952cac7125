//! Shared data models for the ClipForge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Projects, clips and platform duration presets
//! - Source assets and resolved export sources
//! - Time-coded transcripts
//! - Render settings and output specs
//! - Processing jobs and batch exports, including their read schemas

pub mod batch;
pub mod clip;
pub mod error;
pub mod id;
pub mod job;
pub mod preset;
pub mod project;
pub mod render;
pub mod source;
pub mod timestamp;
pub mod transcript;

// Re-export common types
pub use batch::{BatchClip, BatchClipStatus, BatchClipUpdate, BatchExport, BatchStatus, BatchStatusView};
pub use clip::{Clip, ClipAiData, ViralityBreakdown, ViralityPrediction};
pub use error::{ModelError, ModelResult};
pub use id::{BatchId, JobId, ProjectId};
pub use job::{JobStatus, JobStatusView, ProcessingJob, WorkerUpdate};
pub use preset::{Platform, PlatformPreset};
pub use project::{AnalysisSummary, Project, ProjectStatus, VideoReference};
pub use render::{
    AudioMix, CaptionSettings, CaptionSource, CaptionStyle, CropSettings, OutputSpec, OverlayLayout,
    OverlaySettings, QualityTier, RenderSettings, RenderSettingsRequest, TrimRange,
};
pub use source::{ClipCapture, ResolvedSource, SourceAsset, SourceOrigin, SourceProvenance, UploadedVideo};
pub use transcript::{Transcript, TranscriptSegment};
