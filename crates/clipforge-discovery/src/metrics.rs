//! Discovery metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const GENERATION_TOTAL: &str = "clipforge_generation_total";
    pub const GENERATION_DURATION_SECONDS: &str = "clipforge_generation_duration_seconds";
    pub const ANALYSIS_FALLBACKS_TOTAL: &str = "clipforge_analysis_fallbacks_total";
    pub const CLIPS_DISCOVERED_TOTAL: &str = "clipforge_clips_discovered_total";
    pub const ENRICHMENT_TOTAL: &str = "clipforge_enrichment_total";
}

/// Record one content-generation call and how it ended.
pub fn record_generation(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::GENERATION_TOTAL, &labels).increment(1);
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_fallback(reason: &str) {
    counter!(names::ANALYSIS_FALLBACKS_TOTAL, "reason" => reason.to_string()).increment(1);
}

pub fn record_clips_discovered(count: usize, source: &str) {
    counter!(names::CLIPS_DISCOVERED_TOTAL, "source" => source.to_string()).increment(count as u64);
}

pub fn record_enrichment(outcome: &str) {
    counter!(names::ENRICHMENT_TOTAL, "outcome" => outcome.to_string()).increment(1);
}
