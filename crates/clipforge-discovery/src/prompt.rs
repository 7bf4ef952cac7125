//! Prompt construction for candidate generation and enrichment.

use clipforge_models::Clip;

use crate::response::GenerationRequest;

/// Build the candidate-generation prompt.
pub fn build_generation_prompt(request: &GenerationRequest) -> String {
    let constraints = &request.platform_constraints;
    let channel = request.channel_name.as_deref().unwrap_or("unknown");
    let transcript = if request.sampled_transcript.is_empty() {
        "(no transcript available; infer likely moments from the title and duration)"
    } else {
        request.sampled_transcript.as_str()
    };

    format!(
        r#"You are selecting short-form clips from a long-form video.

VIDEO
- Title: {title}
- Channel: {channel}
- Duration: {duration:.0} seconds

CONSTRAINTS
- Return between {min_clips} and {max_clips} clips.
- Each clip must last between {min_dur:.0} and {max_dur:.0} seconds; aim for about {target_dur:.0} seconds.
- Clips must not overlap and must start at least {gap} seconds apart.
- Spread clips across the ENTIRE video: roughly equal counts in each third of the timeline.
  Do not cluster clips in the opening minutes.
- startTime and endTime are seconds from the start of the video, 0 <= startTime < endTime <= {duration:.0}.
- score is an integer from 0 to 100 estimating how well the clip works on its own.

OUTPUT
Return ONLY a single JSON object with this schema:
{{
  "clips": [
    {{
      "startTime": 0,
      "endTime": 0,
      "duration": 0,
      "transcriptSummary": "what is said in the clip",
      "score": 0,
      "uniqueAngle": "what makes this moment distinct",
      "emotionalHook": "curiosity | humor | surprise | inspiration | controversy | relatability"
    }}
  ],
  "overallAssessment": "one paragraph",
  "topics": ["topic"]
}}

TRANSCRIPT (timestamped excerpts)
{transcript}
"#,
        title = request.video_title,
        channel = channel,
        duration = request.duration_seconds,
        min_clips = request.min_clips,
        max_clips = request.max_clips,
        min_dur = constraints.min_duration,
        max_dur = constraints.max_duration,
        target_dur = constraints.target_duration,
        gap = request.min_gap_seconds,
        transcript = transcript,
    )
}

/// Build the enrichment prompt for a set of accepted clips.
pub fn build_scoring_prompt(video_title: &str, clips: &[Clip]) -> String {
    let mut listing = String::new();
    for clip in clips {
        listing.push_str(&format!(
            "- clipId: {} ({:.0}s-{:.0}s)\n  transcript: {}\n",
            clip.id, clip.start_time, clip.end_time, clip.transcript
        ));
    }

    format!(
        r#"Rate each clip from the video "{video_title}" for short-form virality.

For every clip return hookStrength, emotionalImpact, shareability, pacing and overall
as integers from 0 to 100, plus prediction (one of "viral", "high", "medium", "low")
and a one-sentence reasoning.

Return ONLY a single JSON object:
{{"scores": [{{"clipId": "...", "hookStrength": 0, "emotionalImpact": 0, "shareability": 0, "pacing": 0, "overall": 0, "prediction": "medium", "reasoning": "..."}}]}}

CLIPS
{listing}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::PlatformPreset;

    #[test]
    fn test_generation_prompt_carries_constraints() {
        let request = GenerationRequest {
            video_title: "Deep Work Podcast #12".into(),
            channel_name: Some("Deep Work".into()),
            duration_seconds: 1800.0,
            sampled_transcript: "[00:00:05] hello".into(),
            min_clips: 8,
            max_clips: 15,
            platform_constraints: PlatformPreset::default().into(),
            min_gap_seconds: 30,
        };
        let prompt = build_generation_prompt(&request);
        assert!(prompt.contains("between 8 and 15 clips"));
        assert!(prompt.contains("between 15 and 60 seconds"));
        assert!(prompt.contains("at least 30 seconds apart"));
        assert!(prompt.contains("ENTIRE video"));
        assert!(prompt.contains("[00:00:05] hello"));
    }

    #[test]
    fn test_scoring_prompt_lists_clip_ids() {
        let clip = Clip::new(10.0, 40.0, 70).with_transcript("a great line");
        let prompt = build_scoring_prompt("Talk", std::slice::from_ref(&clip));
        assert!(prompt.contains(&clip.id));
        assert!(prompt.contains("a great line"));
    }
}
