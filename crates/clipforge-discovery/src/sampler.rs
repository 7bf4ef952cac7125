//! Duration-aware clip-count bands and transcript sampling.
//!
//! Short videos send a prefix of the transcript sized to the video. Long videos
//! are cut into equal time buckets and each bucket contributes an equal slice,
//! so the prompt always covers the beginning, middle and end.

use serde::{Deserialize, Serialize};

use clipforge_models::timestamp::format_range_label;
use clipforge_models::Transcript;

/// Videos at or above this length are sampled by time bucket.
pub const BUCKETED_SAMPLING_THRESHOLD_SECS: f64 = 1800.0;

pub const MIN_SAMPLE_CHARS: usize = 4_000;
pub const MAX_SAMPLE_CHARS: usize = 12_000;

/// Total character budget across all buckets of a long video.
pub const BUCKETED_SAMPLE_CHARS: usize = 24_000;

/// Inclusive range of clips to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipCountRange {
    pub min_clips: usize,
    pub max_clips: usize,
}

impl ClipCountRange {
    /// Count band for a video of `duration_secs`. Band edges are inclusive on the upper side.
    pub fn for_duration(duration_secs: f64) -> Self {
        let (min_clips, max_clips) = match duration_secs {
            d if d <= 600.0 => (4, 8),
            d if d <= 1800.0 => (8, 15),
            d if d <= 3600.0 => (12, 25),
            d if d <= 7200.0 => (20, 40),
            _ => (30, 60),
        };
        Self { min_clips, max_clips }
    }
}

/// Number of time buckets for bucketed sampling.
pub fn bucket_count(duration_secs: f64) -> usize {
    match duration_secs {
        d if d <= 3600.0 => 3,
        d if d <= 7200.0 => 4,
        _ => 6,
    }
}

/// Character budget for a short video's transcript prefix.
pub fn prefix_budget(duration_secs: f64) -> usize {
    let scaled = (duration_secs.max(0.0) / BUCKETED_SAMPLING_THRESHOLD_SECS) * MAX_SAMPLE_CHARS as f64;
    (scaled as usize).clamp(MIN_SAMPLE_CHARS, MAX_SAMPLE_CHARS)
}

/// Transcript text prepared for the generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSample {
    pub text: String,
    /// Number of time buckets, 1 for prefix sampling
    pub buckets: usize,
    /// Whether any transcript text was cut
    pub truncated: bool,
}

/// Build a bounded, time-spread sample of `transcript`.
pub fn sample_transcript(duration_secs: f64, transcript: &Transcript) -> TranscriptSample {
    if transcript.is_empty() {
        return TranscriptSample {
            text: String::new(),
            buckets: 0,
            truncated: false,
        };
    }

    if duration_secs < BUCKETED_SAMPLING_THRESHOLD_SECS {
        let full = transcript.to_timestamped_text();
        let (text, truncated) = truncate_chars(&full, prefix_budget(duration_secs));
        return TranscriptSample {
            text: text.to_string(),
            buckets: 1,
            truncated,
        };
    }

    let buckets = bucket_count(duration_secs);
    let bucket_len = duration_secs / buckets as f64;
    let per_bucket = BUCKETED_SAMPLE_CHARS / buckets;

    let mut parts = Vec::with_capacity(buckets);
    let mut truncated = false;
    for i in 0..buckets {
        let start = bucket_len * i as f64;
        // Last bucket is open-ended so segments past the reported duration still land somewhere.
        let end = if i + 1 == buckets {
            f64::INFINITY
        } else {
            bucket_len * (i + 1) as f64
        };
        let lines = transcript.timestamped_lines(start, end);
        let (slice, cut) = truncate_chars(&lines, per_bucket);
        truncated |= cut;

        let label_end = if end.is_finite() { end } else { duration_secs };
        parts.push(format!("{}\n{}", format_range_label(start, label_end), slice.trim_end()));
    }

    TranscriptSample {
        text: parts.join("\n\n"),
        buckets,
        truncated,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}
