//! Overlap resolution.
//!
//! First fit by start time: walk candidates in start order and keep each one
//! that does not intersect anything already kept. This favors an even spread
//! over the best total score; an early low-scoring clip can block a later
//! higher-scoring one.
//!
//! Intervals are half-open. The minimum spacing between clips is only asked
//! of the generator in its prompt; clips that are disjoint but close together
//! both survive here.

use clipforge_models::Clip;

/// Drop overlapping candidates, then order survivors by score (highest first).
pub fn resolve_overlaps(mut candidates: Vec<Clip>) -> Vec<Clip> {
    candidates.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut accepted: Vec<Clip> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        // accepted is start-ordered and disjoint, so only the last one can intersect
        let blocked = accepted.last().is_some_and(|last| last.overlaps(&candidate));
        if !blocked {
            accepted.push(candidate);
        }
    }

    sort_by_score(&mut accepted);
    accepted
}

/// Stable sort by score, highest first.
pub fn sort_by_score(clips: &mut [Clip]) {
    clips.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Keep at most `max` clips, dropping the lowest scores. Expects score order.
pub fn cap_clip_count(mut clips: Vec<Clip>, max: usize) -> Vec<Clip> {
    clips.truncate(max);
    clips
}
