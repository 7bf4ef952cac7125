//! Render settings and output specs.
//!
//! Clients send a sparse [`RenderSettingsRequest`]; [`RenderSettingsRequest::normalize`]
//! fills every default and validates it against the clip being exported.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::{ModelError, ModelResult};

/// Default crop position (center).
pub const DEFAULT_CROP_POSITION: u8 = 50;
/// Default primary audio volume.
pub const DEFAULT_PRIMARY_VOLUME: u8 = 100;
/// Default secondary audio volume (muted).
pub const DEFAULT_SECONDARY_VOLUME: u8 = 0;

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Draft,
    #[default]
    Standard,
    High,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Draft => "draft",
            QualityTier::Standard => "standard",
            QualityTier::High => "high",
        }
    }

    /// Output spec rendered for this tier (vertical 9:16).
    pub fn output_spec(&self) -> OutputSpec {
        match self {
            QualityTier::Draft => OutputSpec::new(720, 1280, 30),
            QualityTier::Standard => OutputSpec::new(1080, 1920, 30),
            QualityTier::High => OutputSpec::new(1080, 1920, 60),
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution, frame rate and codec of the rendered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
}

impl OutputSpec {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            codec: "h264".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    #[default]
    Classic,
    Bold,
    Karaoke,
    Minimal,
}

/// Where caption text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSource {
    /// Clip transcript slice
    #[default]
    Transcript,
    /// Speech recognition run by the render worker
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionSettings {
    pub enabled: bool,
    pub style: CaptionStyle,
    pub source: CaptionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CropSettings {
    /// Horizontal focus, 0 (left) to 100 (right)
    pub position_x: u8,
    /// Vertical focus, 0 (top) to 100 (bottom)
    pub position_y: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrimRange {
    pub start: f64,
    pub end: f64,
}

impl TrimRange {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioMix {
    pub primary_volume: u8,
    pub secondary_volume: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayout {
    #[default]
    SplitBottom,
    SplitTop,
    PictureInPicture,
}

/// Secondary video composed with the primary source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlaySettings {
    pub source_ref: String,
    pub layout: OverlayLayout,
}

/// Fully normalized render settings pinned on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    pub quality: QualityTier,
    pub captions: CaptionSettings,
    pub crop: CropSettings,
    pub trim: TrimRange,
    pub audio: AudioMix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySettings>,
}

/// Sparse settings as sent by clients or saved per clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderSettingsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_style: Option<CaptionStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_source: Option<CaptionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_position_x: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_position_y: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_layout: Option<OverlayLayout>,
}

impl RenderSettingsRequest {
    /// Fill unset fields from `base` (e.g. settings saved on the clip).
    pub fn merged_over(&self, base: &RenderSettingsRequest) -> RenderSettingsRequest {
        RenderSettingsRequest {
            quality: self.quality.or(base.quality),
            captions_enabled: self.captions_enabled.or(base.captions_enabled),
            caption_style: self.caption_style.or(base.caption_style),
            caption_source: self.caption_source.or(base.caption_source),
            crop_position_x: self.crop_position_x.or(base.crop_position_x),
            crop_position_y: self.crop_position_y.or(base.crop_position_y),
            trim_start: self.trim_start.or(base.trim_start),
            trim_end: self.trim_end.or(base.trim_end),
            primary_volume: self.primary_volume.or(base.primary_volume),
            secondary_volume: self.secondary_volume.or(base.secondary_volume),
            overlay_enabled: self.overlay_enabled.or(base.overlay_enabled),
            overlay_source_ref: self
                .overlay_source_ref
                .clone()
                .or_else(|| base.overlay_source_ref.clone()),
            overlay_layout: self.overlay_layout.or(base.overlay_layout),
        }
    }

    /// Apply defaults and validate against the clip being exported.
    pub fn normalize(&self, clip: &Clip) -> ModelResult<RenderSettings> {
        let trim = TrimRange {
            start: self.trim_start.unwrap_or(clip.start_time),
            end: self.trim_end.unwrap_or(clip.end_time),
        };
        if !trim.start.is_finite() || !trim.end.is_finite() {
            return Err(ModelError::invalid_time_range("trim bounds must be numbers"));
        }
        if trim.start < clip.start_time || trim.end > clip.end_time || trim.start >= trim.end {
            return Err(ModelError::invalid_time_range(format!(
                "trim [{}, {}) must lie within clip [{}, {})",
                trim.start, trim.end, clip.start_time, clip.end_time
            )));
        }

        let overlay = if self.overlay_enabled == Some(true) {
            let source_ref = self
                .overlay_source_ref
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ModelError::invalid_settings("overlay enabled without a source"))?;
            Some(OverlaySettings {
                source_ref: source_ref.to_string(),
                layout: self.overlay_layout.unwrap_or_default(),
            })
        } else {
            None
        };

        Ok(RenderSettings {
            quality: self.quality.unwrap_or_default(),
            captions: CaptionSettings {
                enabled: self.captions_enabled.unwrap_or(true),
                style: self.caption_style.unwrap_or_default(),
                source: self.caption_source.unwrap_or_default(),
            },
            crop: CropSettings {
                position_x: self.crop_position_x.unwrap_or(DEFAULT_CROP_POSITION).min(100),
                position_y: self.crop_position_y.unwrap_or(DEFAULT_CROP_POSITION).min(100),
            },
            trim,
            audio: AudioMix {
                primary_volume: self.primary_volume.unwrap_or(DEFAULT_PRIMARY_VOLUME).min(100),
                secondary_volume: self
                    .secondary_volume
                    .unwrap_or(DEFAULT_SECONDARY_VOLUME)
                    .min(100),
            },
            overlay,
        })
    }
}
