//! Gemini `generateContent` client for candidate generation and enrichment.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use clipforge_models::{Clip, ViralityBreakdown, ViralityPrediction};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::generator::{ContentGenerator, ViralityScorer};
use crate::prompt::{build_generation_prompt, build_scoring_prompt};
use crate::response::{extract_first_object, parse_score_value, strip_code_fences, GenerationRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODELS: &str = "gemini-2.5-flash,gemini-2.5-flash-lite,gemini-2.5-pro";

/// Output token budget for a generation request asking for up to `max_clips`.
pub fn generation_token_budget(max_clips: usize) -> u32 {
    (max_clips as u32 * 350 + 1024).clamp(4096, 32768)
}

fn scoring_token_budget(clips: usize) -> u32 {
    (clips as u32 * 200 + 512).clamp(2048, 16384)
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    /// Models tried in order until one answers
    pub models: Vec<String>,
    pub base_url: String,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: parse_models(DEFAULT_MODELS),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
            models: parse_models(
                &std::env::var("GEMINI_MODELS").unwrap_or_else(|_| DEFAULT_MODELS.to_string()),
            ),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(
                std::env::var("AI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        }
    }
}

fn parse_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// One enrichment score entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreEntry {
    clip_id: String,
    #[serde(default)]
    hook_strength: Value,
    #[serde(default)]
    emotional_impact: Value,
    #[serde(default)]
    shareability: Value,
    #[serde(default)]
    pacing: Value,
    #[serde(default)]
    overall: Value,
    #[serde(default)]
    prediction: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

impl ScoreEntry {
    fn into_breakdown(self) -> Option<(String, ViralityBreakdown)> {
        let overall = parse_score_value(&self.overall)?;
        let prediction = self
            .prediction
            .as_deref()
            .and_then(|p| serde_json::from_value(Value::String(p.trim().to_lowercase())).ok())
            .unwrap_or_else(|| ViralityPrediction::from_score(overall));
        Some((
            self.clip_id,
            ViralityBreakdown {
                hook_strength: parse_score_value(&self.hook_strength).unwrap_or(overall),
                emotional_impact: parse_score_value(&self.emotional_impact).unwrap_or(overall),
                shareability: parse_score_value(&self.shareability).unwrap_or(overall),
                pacing: parse_score_value(&self.pacing).unwrap_or(overall),
                overall,
                prediction,
                reasoning: self.reasoning,
            },
        ))
    }
}

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> DiscoveryResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| DiscoveryError::not_configured("GEMINI_API_KEY not set"))?;
        if config.models.is_empty() {
            return Err(DiscoveryError::not_configured("GEMINI_MODELS is empty"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DiscoveryError::Network)?;
        Ok(Self {
            api_key,
            client,
            config,
        })
    }

    pub fn from_env() -> DiscoveryResult<Self> {
        Self::new(GeminiConfig::from_env())
    }

    /// Try each configured model in order, returning the first text answer.
    async fn generate_text(&self, prompt: &str, max_output_tokens: u32) -> DiscoveryResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            debug!(model = %model, "Calling Gemini");
            match self.call_model(model, prompt, max_output_tokens).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "Gemini answered");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DiscoveryError::service_error("All Gemini models failed")))
    }

    async fn call_model(&self, model: &str, prompt: &str, max_output_tokens: u32) -> DiscoveryResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url,
            model,
            urlencoding::encode(&self.api_key)
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                max_output_tokens,
                temperature: 0.4,
            },
        };

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout(self.config.timeout.as_secs())
            } else {
                DiscoveryError::Network(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::service_error(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::malformed(format!("Failed to parse Gemini response: {}", e)))?;

        let text: String = gemini_response
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DiscoveryError::service_error("No content in Gemini response"))?;

        Ok(strip_code_fences(&text).to_string())
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> DiscoveryResult<String> {
        let prompt = build_generation_prompt(request);
        self.generate_text(&prompt, generation_token_budget(request.max_clips))
            .await
    }
}

#[async_trait]
impl ViralityScorer for GeminiClient {
    async fn score(
        &self,
        video_title: &str,
        clips: &[Clip],
    ) -> DiscoveryResult<HashMap<String, ViralityBreakdown>> {
        let prompt = build_scoring_prompt(video_title, clips);
        let text = self
            .generate_text(&prompt, scoring_token_budget(clips.len()))
            .await?;

        let object = extract_first_object(&text)
            .ok_or_else(|| DiscoveryError::malformed("No JSON object in scoring response"))?;
        let entries = match object.get("scores") {
            Some(Value::Array(entries)) => entries.clone(),
            _ => return Err(DiscoveryError::malformed("Scoring response has no scores array")),
        };

        Ok(entries
            .into_iter()
            .filter_map(|e| serde_json::from_value::<ScoreEntry>(e).ok())
            .filter_map(ScoreEntry::into_breakdown)
            .collect())
    }
}
