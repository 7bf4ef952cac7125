//! Platform duration presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Target short-form platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Tiktok,
    YoutubeShorts,
    InstagramReels,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Tiktok => "tiktok",
            Platform::YoutubeShorts => "youtube_shorts",
            Platform::InstagramReels => "instagram_reels",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Acceptable clip length window for a target platform, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlatformPreset {
    pub min_duration: f64,
    pub max_duration: f64,
    pub target_duration: f64,
}

impl PlatformPreset {
    /// Create a preset, checking `0 < min <= target <= max`.
    pub fn new(min_duration: f64, max_duration: f64, target_duration: f64) -> ModelResult<Self> {
        let preset = Self {
            min_duration,
            max_duration,
            target_duration,
        };
        preset.validate()?;
        Ok(preset)
    }

    /// Built-in preset for a platform.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Tiktok => Self {
                min_duration: 15.0,
                max_duration: 60.0,
                target_duration: 30.0,
            },
            Platform::YoutubeShorts => Self {
                min_duration: 15.0,
                max_duration: 60.0,
                target_duration: 45.0,
            },
            Platform::InstagramReels => Self {
                min_duration: 15.0,
                max_duration: 90.0,
                target_duration: 30.0,
            },
        }
    }

    pub fn validate(&self) -> ModelResult<()> {
        let finite = self.min_duration.is_finite()
            && self.max_duration.is_finite()
            && self.target_duration.is_finite();
        if !finite || self.min_duration <= 0.0 {
            return Err(ModelError::InvalidPreset(
                "durations must be positive numbers".into(),
            ));
        }
        if self.min_duration > self.target_duration || self.target_duration > self.max_duration {
            return Err(ModelError::InvalidPreset(format!(
                "expected min <= target <= max, got {}/{}/{}",
                self.min_duration, self.target_duration, self.max_duration
            )));
        }
        Ok(())
    }

    /// Whether a duration lies inside `[min_duration, max_duration]`.
    pub fn accepts(&self, duration: f64) -> bool {
        duration >= self.min_duration && duration <= self.max_duration
    }
}

impl Default for PlatformPreset {
    fn default() -> Self {
        Self::for_platform(Platform::default())
    }
}
