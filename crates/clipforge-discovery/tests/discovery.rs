use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clipforge_discovery::{
    AnalysisInput, ClipDiscovery, ContentGenerator, DiscoveryConfig, DiscoveryError, DiscoveryResult,
    FallbackReason, GenerationRequest,
};
use clipforge_models::{Clip, PlatformPreset, Transcript, TranscriptSegment};

struct ScriptedGenerator {
    reply: String,
    delay: Duration,
    seen: Arc<std::sync::Mutex<Option<GenerationRequest>>>,
}

impl ScriptedGenerator {
    fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: Duration::ZERO,
            seen: Arc::new(std::sync::Mutex::new(None)),
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> DiscoveryResult<String> {
        *self.seen.lock().unwrap() = Some(request.clone());
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

struct FailingGenerator(AtomicUsize);

#[async_trait]
impl ContentGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> DiscoveryResult<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Err(DiscoveryError::service_error("quota exceeded"))
    }
}

fn transcript(duration: f64) -> Transcript {
    let segments = (0..(duration as usize / 10))
        .map(|i| TranscriptSegment::new(i as f64 * 10.0, 9.0, format!("line {i}")))
        .collect();
    Transcript::new(segments)
}

fn input<'a>(duration: f64, transcript: &'a Transcript, preset: &'a PlatformPreset) -> AnalysisInput<'a> {
    AnalysisInput {
        video_title: "Building in public",
        channel_name: Some("Indie Hackers"),
        video_duration: duration,
        transcript,
        preset,
    }
}

fn assert_clip_set_valid(clips: &[Clip], duration: f64, preset: &PlatformPreset) {
    assert!(!clips.is_empty());
    for (i, a) in clips.iter().enumerate() {
        assert!(0.0 <= a.start_time && a.start_time < a.end_time && a.end_time <= duration);
        assert!(preset.min_duration <= a.duration && a.duration <= preset.max_duration);
        for b in &clips[i + 1..] {
            assert!(a.end_time <= b.start_time || b.end_time <= a.start_time);
        }
    }
}

#[tokio::test]
async fn test_thirty_minute_video_requests_eight_to_fifteen() {
    let generator = ScriptedGenerator::new(r#"{"clips": [{"startTime": 10, "endTime": 40, "score": 70}]}"#);
    let seen = generator.seen.clone();
    let discovery = ClipDiscovery::new(Some(Arc::new(generator)), None, DiscoveryConfig::default());

    let transcript = transcript(1800.0);
    let preset = PlatformPreset::default();
    discovery.discover(&input(1800.0, &transcript, &preset)).await;

    let request = seen.lock().unwrap().clone().unwrap();
    assert_eq!((request.min_clips, request.max_clips), (8, 15));
    assert!(request.sampled_transcript.contains("[00:20:00 - 00:30:00]"));
}

#[tokio::test]
async fn test_fallback_when_generation_times_out() {
    let mut generator = ScriptedGenerator::new(r#"{"clips": []}"#);
    generator.delay = Duration::from_secs(5);
    let config = DiscoveryConfig {
        ai_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let discovery = ClipDiscovery::new(Some(Arc::new(generator)), None, config);

    let transcript = transcript(2400.0);
    let preset = PlatformPreset::default();
    let output = discovery.discover(&input(2400.0, &transcript, &preset)).await;

    assert_eq!(output.fallback_reason, Some(FallbackReason::Timeout));
    assert_clip_set_valid(&output.clips, 2400.0, &preset);
    assert!(output.ai_data.values().all(|d| d.from_fallback));
}

#[tokio::test]
async fn test_fallback_on_service_error() {
    let discovery = ClipDiscovery::new(
        Some(Arc::new(FailingGenerator(AtomicUsize::new(0)))),
        None,
        DiscoveryConfig::default(),
    );
    let transcript = Transcript::empty();
    let preset = PlatformPreset::for_platform(clipforge_models::Platform::InstagramReels);
    let output = discovery.discover(&input(500.0, &transcript, &preset)).await;

    assert!(matches!(output.fallback_reason, Some(FallbackReason::ServiceError(_))));
    assert_clip_set_valid(&output.clips, 500.0, &preset);
}

#[tokio::test]
async fn test_ai_candidates_resolved_and_sorted() {
    let reply = r#"Here you go:
```json
{
  "clips": [
    {"startTime": 100, "endTime": 130, "score": 55, "transcriptSummary": "setup"},
    {"startTime": 120, "endTime": 160, "score": 95, "transcriptSummary": "payoff"},
    {"startTime": "00:05:00", "endTime": "00:05:45", "score": 80},
    {"startTime": 900, "endTime": 930, "score": 99},
    {"startTime": 400, "endTime": 402, "score": 60}
  ],
  "overallAssessment": "Strong middle section",
  "topics": ["startups"]
}
```"#;
    let discovery = ClipDiscovery::new(Some(Arc::new(ScriptedGenerator::new(reply))), None, DiscoveryConfig::default());

    let transcript = transcript(600.0);
    let preset = PlatformPreset::default();
    let output = discovery.discover(&input(600.0, &transcript, &preset)).await;

    assert!(output.fallback_reason.is_none());
    assert_clip_set_valid(&output.clips, 600.0, &preset);

    let scores: Vec<u8> = output.clips.iter().map(|c| c.score).collect();
    // 120-160 overlaps the earlier 100-130 and is dropped; 900 is past the end
    assert_eq!(scores, vec![80, 60, 55]);

    let early = output.clips.iter().find(|c| c.start_time == 100.0).unwrap();
    assert_eq!(early.transcript, "line 10 line 11 line 12");
    assert_eq!(output.ai_data[&early.id].transcript_summary.as_deref(), Some("setup"));

    let stretched = output.clips.iter().find(|c| c.start_time == 400.0).unwrap();
    assert_eq!(stretched.duration, preset.target_duration);

    assert_eq!(output.overall_assessment.as_deref(), Some("Strong middle section"));
}

#[tokio::test]
async fn test_surplus_candidates_capped_at_max() {
    let clips: Vec<String> = (0..12)
        .map(|i| format!(r#"{{"startTime": {}, "endTime": {}, "score": {}}}"#, i * 40, i * 40 + 30, 50 + i))
        .collect();
    let reply = format!(r#"{{"clips": [{}]}}"#, clips.join(","));
    let discovery = ClipDiscovery::new(Some(Arc::new(ScriptedGenerator::new(reply))), None, DiscoveryConfig::default());

    let transcript = Transcript::empty();
    let preset = PlatformPreset::default();
    let output = discovery.discover(&input(600.0, &transcript, &preset)).await;

    assert_eq!(output.clips.len(), 8);
    assert_eq!(output.clips.last().unwrap().score, 54);
}
