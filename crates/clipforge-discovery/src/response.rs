//! Content-generation request/response contract and lenient response parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use clipforge_models::timestamp::parse_timestamp;
use clipforge_models::PlatformPreset;

/// Clip length constraints sent with a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConstraints {
    pub min_duration: f64,
    pub max_duration: f64,
    pub target_duration: f64,
}

impl From<PlatformPreset> for PlatformConstraints {
    fn from(preset: PlatformPreset) -> Self {
        Self {
            min_duration: preset.min_duration,
            max_duration: preset.max_duration,
            target_duration: preset.target_duration,
        }
    }
}

/// Structured input for the content-generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub video_title: String,
    pub channel_name: Option<String>,
    pub duration_seconds: f64,
    pub sampled_transcript: String,
    pub min_clips: usize,
    pub max_clips: usize,
    pub platform_constraints: PlatformConstraints,
    /// Minimum spacing between candidates, in seconds
    pub min_gap_seconds: u32,
}

/// One candidate as returned by the service, fields still untyped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    #[serde(default, alias = "start_time", alias = "start")]
    pub start_time: Value,
    #[serde(default, alias = "end_time", alias = "end")]
    pub end_time: Value,
    #[serde(default)]
    pub duration: Value,
    #[serde(default, alias = "transcript_summary", alias = "transcript")]
    pub transcript_summary: Option<String>,
    #[serde(default)]
    pub score: Value,
    #[serde(default, alias = "unique_angle")]
    pub unique_angle: Option<String>,
    #[serde(default, alias = "emotional_hook")]
    pub emotional_hook: Option<String>,
    #[serde(default, alias = "target_platforms")]
    pub target_platforms: Vec<String>,
}

/// Parsed top-level response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub clips: Vec<Value>,
    #[serde(default, alias = "overall_assessment")]
    pub overall_assessment: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl GenerationResponse {
    /// Candidates that are at least shaped like objects. Others are dropped.
    pub fn candidates(&self) -> Vec<RawCandidate> {
        self.clips
            .iter()
            .filter_map(|c| serde_json::from_value(c.clone()).ok())
            .collect()
    }
}

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").ok());

/// Remove a surrounding markdown code fence, keeping its body.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed)
}

/// First well-formed JSON object in `text`. Anything around it is ignored.
pub fn extract_first_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let body = strip_code_fences(text);
    for (idx, _) in body.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&body[idx..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}

/// Parse generation output into a response. `None` when no usable object is present.
pub fn parse_generation_output(text: &str) -> Option<GenerationResponse> {
    let object = extract_first_object(text)?;
    if !object.contains_key("clips") {
        return None;
    }
    serde_json::from_value(Value::Object(object)).ok()
}

/// Read a time value given as a number, numeric string or `HH:MM:SS`/`MM:SS`.
pub fn parse_time_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_timestamp(s).ok(),
        _ => None,
    }
}

/// Read a 0-100 score given as a number or numeric string.
pub fn parse_score_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        let obj = extract_first_object(r#"{"clips": [], "topics": ["a"]}"#).unwrap();
        assert_eq!(obj["topics"], json!(["a"]));
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let text = r#"Sure! Here are the clips you asked for:
{"clips": [{"startTime": 10, "endTime": 40, "score": 80}]}
Let me know if you need {more}."#;
        let candidates = parse_generation_output(text).unwrap().candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].start_time, json!(10));
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "```json\n{\"clips\": [], \"overallAssessment\": \"solid\"}\n```";
        let response = parse_generation_output(text).unwrap();
        assert_eq!(response.overall_assessment.as_deref(), Some("solid"));
    }

    #[test]
    fn test_skips_broken_object_before_good_one() {
        let text = r#"{"clips": [ broken {"clips": [{"start": "00:01:00", "end": "00:01:30", "score": "75"}]}"#;
        let candidates = parse_generation_output(text).unwrap().candidates();
        assert_eq!(parse_time_value(&candidates[0].start_time), Some(60.0));
        assert_eq!(parse_score_value(&candidates[0].score), Some(75));
    }

    #[test]
    fn test_non_object_candidates_are_dropped() {
        let text = r#"{"clips": ["not a clip", {"startTime": 5, "endTime": 35, "score": 70}]}"#;
        assert_eq!(parse_generation_output(text).unwrap().candidates().len(), 1);
    }

    #[test]
    fn test_unparseable_text() {
        assert!(parse_generation_output("I could not find any good clips, sorry.").is_none());
        assert!(parse_generation_output(r#"{"message": "no clips key"}"#).is_none());
    }

    #[test]
    fn test_parse_time_value() {
        assert_eq!(parse_time_value(&json!(12.5)), Some(12.5));
        assert_eq!(parse_time_value(&json!("90")), Some(90.0));
        assert_eq!(parse_time_value(&json!("01:30")), Some(90.0));
        assert_eq!(parse_time_value(&json!("soon")), None);
        assert_eq!(parse_time_value(&json!(null)), None);
        assert_eq!(parse_time_value(&json!([1])), None);
    }

    #[test]
    fn test_parse_score_value() {
        assert_eq!(parse_score_value(&json!(87.6)), Some(88));
        assert_eq!(parse_score_value(&json!(140)), Some(100));
        assert_eq!(parse_score_value(&json!("high")), None);
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerationRequest {
            video_title: "Talk".into(),
            channel_name: None,
            duration_seconds: 1800.0,
            sampled_transcript: String::new(),
            min_clips: 8,
            max_clips: 15,
            platform_constraints: PlatformPreset::default().into(),
            min_gap_seconds: 30,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["minClips"], json!(8));
        assert_eq!(value["platformConstraints"]["targetDuration"], json!(30.0));
    }
}
