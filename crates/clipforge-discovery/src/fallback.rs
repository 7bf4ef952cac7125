//! Deterministic even-spread clip generation used when the AI path fails.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use clipforge_models::{Clip, PlatformPreset, Transcript};

use crate::sampler::ClipCountRange;

/// Emotional hooks assigned round-robin to fallback clips.
pub const FALLBACK_HOOKS: [&str; 6] = [
    "curiosity",
    "humor",
    "surprise",
    "inspiration",
    "controversy",
    "relatability",
];

pub const FALLBACK_MIN_SCORE: u8 = 60;
pub const FALLBACK_MAX_SCORE: u8 = 85;

/// Place clips evenly over the video: one per equal segment, at a seeded
/// pseudo-random offset inside it. The same duration always yields the same clips.
pub fn generate_fallback_clips(
    video_duration: f64,
    preset: &PlatformPreset,
    range: ClipCountRange,
    transcript: &Transcript,
) -> Vec<Clip> {
    if !video_duration.is_finite() || video_duration <= 0.0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(video_duration.to_bits());

    if video_duration < preset.min_duration {
        let clip = Clip::new(0.0, video_duration, rng.random_range(FALLBACK_MIN_SCORE..=FALLBACK_MAX_SCORE))
            .with_transcript(transcript.slice_text(0.0, video_duration))
            .with_emotional_hook(Some(FALLBACK_HOOKS[0].to_string()));
        return vec![clip];
    }

    let clip_len = preset.target_duration.min(video_duration);
    let fit = (video_duration / clip_len).floor() as usize;
    let count = range.min_clips.min(fit).max(1);
    let segment_len = video_duration / count as f64;

    (0..count)
        .map(|i| {
            let segment_start = segment_len * i as f64;
            let slack = segment_len - clip_len;
            let offset = if slack > 0.0 {
                rng.random_range(0.0..slack)
            } else {
                0.0
            };

            let mut start = segment_start + offset;
            let mut end = start + clip_len;
            if end > video_duration {
                end = video_duration;
                start = (end - clip_len).max(0.0);
            }

            let score = rng.random_range(FALLBACK_MIN_SCORE..=FALLBACK_MAX_SCORE);
            Clip::new(start, end, score)
                .with_transcript(transcript.slice_text(start, end))
                .with_emotional_hook(Some(FALLBACK_HOOKS[i % FALLBACK_HOOKS.len()].to_string()))
        })
        .collect()
}
