//! Candidate clip models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categorical virality estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViralityPrediction {
    Viral,
    High,
    #[default]
    Medium,
    Low,
}

impl ViralityPrediction {
    /// Static three-bucket label used when no enrichment is available.
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => ViralityPrediction::High,
            60..=79 => ViralityPrediction::Medium,
            _ => ViralityPrediction::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViralityPrediction::Viral => "viral",
            ViralityPrediction::High => "high",
            ViralityPrediction::Medium => "medium",
            ViralityPrediction::Low => "low",
        }
    }
}

impl std::fmt::Display for ViralityPrediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Richer score breakdown from the enrichment pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ViralityBreakdown {
    pub hook_strength: u8,
    pub emotional_impact: u8,
    pub shareability: u8,
    pub pacing: u8,
    pub overall: u8,
    pub prediction: ViralityPrediction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A time-bounded candidate clip of the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Clip {
    pub id: String,

    /// Start offset in seconds
    pub start_time: f64,

    /// End offset in seconds (exclusive)
    pub end_time: f64,

    pub duration: f64,

    /// Text actually spoken inside `[start_time, end_time)`
    #[serde(default)]
    pub transcript: String,

    /// Quality score (0-100)
    pub score: u8,

    #[serde(default)]
    pub prediction: ViralityPrediction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_angle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_hook: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_platforms: Vec<String>,
}

impl Clip {
    /// Create a clip with a fresh id and a score-derived label.
    pub fn new(start_time: f64, end_time: f64, score: u8) -> Self {
        let score = score.min(100);
        Self {
            id: Self::generate_id(),
            start_time,
            end_time,
            duration: end_time - start_time,
            transcript: String::new(),
            score,
            prediction: ViralityPrediction::from_score(score),
            unique_angle: None,
            emotional_hook: None,
            target_platforms: Vec::new(),
        }
    }

    pub fn generate_id() -> String {
        let raw = Uuid::new_v4().simple().to_string();
        format!("clip_{}", &raw[..12])
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn with_unique_angle(mut self, angle: Option<String>) -> Self {
        self.unique_angle = angle;
        self
    }

    pub fn with_emotional_hook(mut self, hook: Option<String>) -> Self {
        self.emotional_hook = hook;
        self
    }

    pub fn with_target_platforms(mut self, platforms: Vec<String>) -> Self {
        self.target_platforms = platforms;
        self
    }

    /// Half-open interval intersection.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    /// Apply an enrichment breakdown to score and label.
    pub fn apply_breakdown(&mut self, breakdown: &ViralityBreakdown) {
        self.score = breakdown.overall.min(100);
        self.prediction = breakdown.prediction;
    }
}

/// Derived AI data kept per clip alongside the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipAiData {
    /// Content summary proposed by the generation service (auxiliary only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virality: Option<ViralityBreakdown>,

    /// Whether the clip came from the deterministic fallback generator
    #[serde(default)]
    pub from_fallback: bool,
}
