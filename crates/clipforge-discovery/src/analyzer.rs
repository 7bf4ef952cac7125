//! Candidate clip analysis.
//!
//! The generation service either yields parsed candidates or the analyzer
//! records why it could not, and the deterministic fallback takes over. The
//! caller always gets a non-empty candidate list for a video with a known
//! duration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use clipforge_models::{Clip, PlatformPreset, Transcript};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::fallback::generate_fallback_clips;
use crate::generator::ContentGenerator;
use crate::metrics;
use crate::response::{
    parse_generation_output, parse_score_value, parse_time_value, GenerationRequest, RawCandidate,
};
use crate::sampler::{sample_transcript, ClipCountRange};

/// Why the AI path was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NotConfigured,
    Timeout,
    ServiceError(String),
    Malformed,
    NoUsableCandidates,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NotConfigured => "not_configured",
            FallbackReason::Timeout => "timeout",
            FallbackReason::ServiceError(_) => "service_error",
            FallbackReason::Malformed => "malformed",
            FallbackReason::NoUsableCandidates => "no_usable_candidates",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::ServiceError(msg) => write!(f, "service_error: {}", msg),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Candidates that survived validation, with the service's auxiliary output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCandidates {
    pub clips: Vec<Clip>,
    /// Service-written summaries keyed by clip id
    pub summaries: HashMap<String, String>,
    pub overall_assessment: Option<String>,
    pub topics: Vec<String>,
    /// Candidates rejected by validation
    pub dropped: usize,
}

/// Result of one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Parsed(ParsedCandidates),
    Fallback(FallbackReason),
}

/// What the analyzer needs to know about the video.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
    pub video_title: &'a str,
    pub channel_name: Option<&'a str>,
    pub video_duration: f64,
    pub transcript: &'a Transcript,
    pub preset: &'a PlatformPreset,
}

/// Analyzer result before overlap resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutput {
    pub candidates: Vec<Clip>,
    pub summaries: HashMap<String, String>,
    pub overall_assessment: Option<String>,
    pub topics: Vec<String>,
    pub range: ClipCountRange,
    /// Set when the deterministic generator produced the candidates
    pub fallback: Option<FallbackReason>,
}

pub struct CandidateAnalyzer {
    generator: Option<Arc<dyn ContentGenerator>>,
    config: DiscoveryConfig,
}

impl CandidateAnalyzer {
    pub fn new(generator: Option<Arc<dyn ContentGenerator>>, config: DiscoveryConfig) -> Self {
        Self { generator, config }
    }

    /// Build the generation request for a video.
    pub fn build_request(&self, input: &AnalysisInput<'_>) -> GenerationRequest {
        let range = ClipCountRange::for_duration(input.video_duration);
        let sample = sample_transcript(input.video_duration, input.transcript);
        debug!(
            buckets = sample.buckets,
            truncated = sample.truncated,
            chars = sample.text.len(),
            "Sampled transcript"
        );
        GenerationRequest {
            video_title: input.video_title.to_string(),
            channel_name: input.channel_name.map(str::to_string),
            duration_seconds: input.video_duration,
            sampled_transcript: sample.text,
            min_clips: range.min_clips,
            max_clips: range.max_clips,
            platform_constraints: (*input.preset).into(),
            min_gap_seconds: self.config.min_clip_gap_secs,
        }
    }

    /// Run the analysis, falling back to even-spread generation on any AI failure.
    pub async fn analyze(&self, input: &AnalysisInput<'_>) -> AnalyzerOutput {
        let range = ClipCountRange::for_duration(input.video_duration);
        let request = self.build_request(input);

        let started = Instant::now();
        let outcome = self.request_candidates(&request, input).await;
        metrics::record_generation(outcome_label(&outcome), started.elapsed().as_secs_f64());

        match outcome {
            GenerationOutcome::Parsed(parsed) => {
                info!(
                    candidates = parsed.clips.len(),
                    dropped = parsed.dropped,
                    "Content generation produced candidates"
                );
                AnalyzerOutput {
                    candidates: parsed.clips,
                    summaries: parsed.summaries,
                    overall_assessment: parsed.overall_assessment,
                    topics: parsed.topics,
                    range,
                    fallback: None,
                }
            }
            GenerationOutcome::Fallback(reason) => {
                warn!(reason = %reason, "Using fallback clip generation");
                metrics::record_fallback(reason.as_str());
                let candidates =
                    generate_fallback_clips(input.video_duration, input.preset, range, input.transcript);
                AnalyzerOutput {
                    candidates,
                    summaries: HashMap::new(),
                    overall_assessment: None,
                    topics: Vec::new(),
                    range,
                    fallback: Some(reason),
                }
            }
        }
    }

    async fn request_candidates(
        &self,
        request: &GenerationRequest,
        input: &AnalysisInput<'_>,
    ) -> GenerationOutcome {
        let Some(generator) = &self.generator else {
            return GenerationOutcome::Fallback(FallbackReason::NotConfigured);
        };

        match tokio::time::timeout(self.config.ai_timeout, generator.generate(request)).await {
            Err(_) => GenerationOutcome::Fallback(FallbackReason::Timeout),
            Ok(Err(DiscoveryError::Timeout(_))) => GenerationOutcome::Fallback(FallbackReason::Timeout),
            Ok(Err(e)) => GenerationOutcome::Fallback(FallbackReason::ServiceError(e.to_string())),
            Ok(Ok(text)) => interpret_output(&text, input),
        }
    }
}

/// Turn raw service text into an outcome.
pub fn interpret_output(text: &str, input: &AnalysisInput<'_>) -> GenerationOutcome {
    let Some(response) = parse_generation_output(text) else {
        return GenerationOutcome::Fallback(FallbackReason::Malformed);
    };

    let raw = response.candidates();
    let total = response.clips.len();
    let mut parsed = ParsedCandidates {
        overall_assessment: response.overall_assessment.filter(|s| !s.trim().is_empty()),
        topics: response.topics,
        ..Default::default()
    };

    for candidate in &raw {
        if let Some((clip, summary)) = validate_candidate(candidate, input) {
            if let Some(summary) = summary {
                parsed.summaries.insert(clip.id.clone(), summary);
            }
            parsed.clips.push(clip);
        }
    }
    parsed.dropped = total - parsed.clips.len();

    if parsed.clips.is_empty() {
        return GenerationOutcome::Fallback(FallbackReason::NoUsableCandidates);
    }
    GenerationOutcome::Parsed(parsed)
}

/// Validate one candidate and fit it to the preset. `None` drops it.
pub fn validate_candidate(raw: &RawCandidate, input: &AnalysisInput<'_>) -> Option<(Clip, Option<String>)> {
    let video_duration = input.video_duration;
    let preset = input.preset;

    let start = parse_time_value(&raw.start_time)?;
    if start < 0.0 || start >= video_duration {
        return None;
    }
    let score = parse_score_value(&raw.score)?;

    let end = optional_time(&raw.end_time)?;
    let length = optional_time(&raw.duration)?;
    let proposed = end.map(|e| e - start).or(length);

    let length = match proposed {
        Some(len) if preset.accepts(len) => len,
        _ => preset.target_duration,
    };
    let (start, end) = fit_window(start, length, video_duration, preset);

    let summary = raw
        .transcript_summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let clip = Clip::new(start, end, score)
        .with_transcript(input.transcript.slice_text(start, end))
        .with_unique_angle(raw.unique_angle.clone())
        .with_emotional_hook(raw.emotional_hook.clone())
        .with_target_platforms(raw.target_platforms.clone());
    Some((clip, summary))
}

/// Absent is `Some(None)`; present but unreadable is `None`.
fn optional_time(value: &serde_json::Value) -> Option<Option<f64>> {
    if value.is_null() {
        Some(None)
    } else {
        parse_time_value(value).map(Some)
    }
}

/// Place a window of `length` seconds at `start`, shifting it back so it ends inside the video.
fn fit_window(start: f64, length: f64, video_duration: f64, preset: &PlatformPreset) -> (f64, f64) {
    if video_duration < preset.min_duration {
        return (0.0, video_duration);
    }
    let length = length.min(video_duration);
    let end = start + length;
    if end <= video_duration {
        (start, end)
    } else {
        ((video_duration - length).max(0.0), video_duration)
    }
}

fn outcome_label(outcome: &GenerationOutcome) -> &'static str {
    match outcome {
        GenerationOutcome::Parsed(_) => "parsed",
        GenerationOutcome::Fallback(reason) => reason.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::TranscriptSegment;
    use serde_json::json;

    fn input<'a>(transcript: &'a Transcript, preset: &'a PlatformPreset) -> AnalysisInput<'a> {
        AnalysisInput {
            video_title: "Talk",
            channel_name: None,
            video_duration: 600.0,
            transcript,
            preset,
        }
    }

    fn raw(value: serde_json::Value) -> RawCandidate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_drops_out_of_range_and_non_numeric() {
        let transcript = Transcript::empty();
        let preset = PlatformPreset::default();
        let input = input(&transcript, &preset);

        assert!(validate_candidate(&raw(json!({"startTime": -1, "endTime": 20, "score": 50})), &input).is_none());
        assert!(validate_candidate(&raw(json!({"startTime": 600, "endTime": 630, "score": 50})), &input).is_none());
        assert!(validate_candidate(&raw(json!({"startTime": "later", "endTime": 30, "score": 50})), &input).is_none());
        assert!(validate_candidate(&raw(json!({"startTime": 10, "endTime": "soon", "score": 50})), &input).is_none());
        assert!(validate_candidate(&raw(json!({"startTime": 10, "endTime": 40, "score": "great"})), &input).is_none());
        assert!(validate_candidate(&raw(json!({"startTime": 10, "endTime": 40, "score": 50})), &input).is_some());
    }

    #[test]
    fn test_out_of_bounds_duration_replaced_by_target() {
        let transcript = Transcript::empty();
        let preset = PlatformPreset::default();
        let input = input(&transcript, &preset);

        let (clip, _) = validate_candidate(&raw(json!({"startTime": 100, "endTime": 105, "score": 70})), &input).unwrap();
        assert_eq!((clip.start_time, clip.end_time), (100.0, 130.0));

        let (clip, _) = validate_candidate(&raw(json!({"startTime": 100, "endTime": 400, "score": 70})), &input).unwrap();
        assert_eq!(clip.duration, 30.0);

        let (clip, _) = validate_candidate(&raw(json!({"startTime": 100, "duration": 45, "score": 70})), &input).unwrap();
        assert_eq!(clip.end_time, 145.0);
    }

    #[test]
    fn test_window_shifted_to_end_inside_video() {
        let transcript = Transcript::empty();
        let preset = PlatformPreset::default();
        let input = input(&transcript, &preset);

        let (clip, _) = validate_candidate(&raw(json!({"startTime": 590, "endTime": 595, "score": 70})), &input).unwrap();
        assert_eq!((clip.start_time, clip.end_time), (570.0, 600.0));
        assert!(preset.accepts(clip.duration));
    }

    #[test]
    fn test_transcript_sliced_from_real_transcript() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(95.0, 4.0, "before"),
            TranscriptSegment::new(101.0, 4.0, "actually said"),
            TranscriptSegment::new(140.0, 4.0, "after"),
        ]);
        let preset = PlatformPreset::default();
        let input = input(&transcript, &preset);

        let (clip, summary) = validate_candidate(
            &raw(json!({"startTime": 100, "endTime": 130, "score": 70, "transcriptSummary": "an invented quote"})),
            &input,
        )
        .unwrap();
        assert_eq!(clip.transcript, "actually said");
        assert_eq!(summary.as_deref(), Some("an invented quote"));
    }

    #[test]
    fn test_interpret_outcomes() {
        let transcript = Transcript::empty();
        let preset = PlatformPreset::default();
        let input = input(&transcript, &preset);

        assert_eq!(
            interpret_output("no json here", &input),
            GenerationOutcome::Fallback(FallbackReason::Malformed)
        );
        assert_eq!(
            interpret_output(r#"{"clips": [{"startTime": 9999, "score": 1}]}"#, &input),
            GenerationOutcome::Fallback(FallbackReason::NoUsableCandidates)
        );
        match interpret_output(
            r#"{"clips": [{"startTime": 0, "endTime": 30, "score": 80}, {"startTime": -5, "score": 1}], "topics": ["focus"]}"#,
            &input,
        ) {
            GenerationOutcome::Parsed(parsed) => {
                assert_eq!(parsed.clips.len(), 1);
                assert_eq!(parsed.dropped, 1);
                assert_eq!(parsed.topics, vec!["focus".to_string()]);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_generator_falls_back() {
        let transcript = Transcript::empty();
        let preset = PlatformPreset::default();
        let analyzer = CandidateAnalyzer::new(None, DiscoveryConfig::default());
        let output = analyzer.analyze(&input(&transcript, &preset)).await;
        assert_eq!(output.fallback, Some(FallbackReason::NotConfigured));
        assert!(!output.candidates.is_empty());
    }
}
