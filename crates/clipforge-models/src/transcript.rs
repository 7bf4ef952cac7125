//! Time-coded transcript types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timestamp::format_seconds;

/// One caption line with its start offset and duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            duration,
            text: text.into(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration.max(0.0)
    }

    /// Whether any part of this segment falls inside `[start, end)`.
    fn intersects(&self, start: f64, end: f64) -> bool {
        self.start < end && (self.start >= start || self.end() > start)
    }
}

/// Full time-coded transcript, ordered by start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(mut segments: Vec<TranscriptSegment>) -> Self {
        segments.retain(|s| s.start.is_finite() && s.start >= 0.0 && !s.text.trim().is_empty());
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { segments }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// Segments touching `[start, end)`.
    pub fn segments_in(&self, start: f64, end: f64) -> impl Iterator<Item = &TranscriptSegment> {
        self.segments.iter().filter(move |s| s.intersects(start, end))
    }

    /// Spoken text in `[start, end)`, joined with single spaces.
    pub fn slice_text(&self, start: f64, end: f64) -> String {
        self.segments_in(start, end)
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render segments whose start falls in `[start, end)` as `[HH:MM:SS] text` lines.
    pub fn timestamped_lines(&self, start: f64, end: f64) -> String {
        let mut out = String::new();
        for segment in self.segments.iter().filter(|s| s.start >= start && s.start < end) {
            out.push('[');
            out.push_str(&format_seconds(segment.start));
            out.push_str("] ");
            out.push_str(segment.text.trim());
            out.push('\n');
        }
        out
    }

    /// The whole transcript as timestamped lines.
    pub fn to_timestamped_text(&self) -> String {
        self.timestamped_lines(0.0, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment::new(10.0, 5.0, "second line"),
            TranscriptSegment::new(0.0, 5.0, "first line"),
            TranscriptSegment::new(20.0, 5.0, "third line"),
            TranscriptSegment::new(30.0, 0.0, "   "),
        ])
    }

    #[test]
    fn test_new_sorts_and_drops_blank_segments() {
        let transcript = sample();
        assert_eq!(transcript.segments().len(), 3);
        assert_eq!(transcript.segments()[0].text, "first line");
    }

    #[test]
    fn test_slice_text_is_half_open() {
        let transcript = sample();
        assert_eq!(transcript.slice_text(0.0, 10.0), "first line");
        assert_eq!(transcript.slice_text(3.0, 12.0), "first line second line");
        assert_eq!(transcript.slice_text(25.0, 40.0), "");
    }

    #[test]
    fn test_timestamped_lines() {
        let transcript = sample();
        assert_eq!(
            transcript.timestamped_lines(5.0, 25.0),
            "[00:00:10] second line\n[00:00:20] third line\n"
        );
    }
}
