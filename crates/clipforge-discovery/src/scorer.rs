//! Best-effort, time-boxed score enrichment.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{info, warn};

use clipforge_models::{Clip, ViralityBreakdown, ViralityPrediction};

use crate::generator::ViralityScorer;
use crate::metrics;

/// How the enrichment pass ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    /// Every clip received a breakdown
    Applied(HashMap<String, ViralityBreakdown>),
    /// Clips keep their base score and static label
    Skipped(String),
}

impl EnrichmentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EnrichmentOutcome::Applied(_))
    }
}

/// Enrich `clips` in place. Applied only when every clip gets a breakdown
/// within `timeout`; otherwise scores stay as they were with a static label.
pub async fn enrich_clips(
    scorer: Option<&dyn ViralityScorer>,
    video_title: &str,
    clips: &mut [Clip],
    timeout: Duration,
) -> EnrichmentOutcome {
    let outcome = match scorer {
        None => EnrichmentOutcome::Skipped("no scorer configured".to_string()),
        Some(_) if clips.is_empty() => EnrichmentOutcome::Skipped("no clips".to_string()),
        Some(scorer) => match tokio::time::timeout(timeout, scorer.score(video_title, clips)).await {
            Err(_) => EnrichmentOutcome::Skipped(format!("timed out after {}s", timeout.as_secs())),
            Ok(Err(e)) => EnrichmentOutcome::Skipped(e.to_string()),
            Ok(Ok(breakdowns)) => {
                let missing = clips.iter().filter(|c| !breakdowns.contains_key(&c.id)).count();
                if missing > 0 {
                    EnrichmentOutcome::Skipped(format!("{} clips without a breakdown", missing))
                } else {
                    EnrichmentOutcome::Applied(breakdowns)
                }
            }
        },
    };

    match &outcome {
        EnrichmentOutcome::Applied(breakdowns) => {
            for clip in clips.iter_mut() {
                if let Some(breakdown) = breakdowns.get(&clip.id) {
                    clip.apply_breakdown(breakdown);
                }
            }
            info!(clips = clips.len(), "Applied virality enrichment");
            metrics::record_enrichment("applied");
        }
        EnrichmentOutcome::Skipped(reason) => {
            for clip in clips.iter_mut() {
                clip.prediction = ViralityPrediction::from_score(clip.score);
            }
            warn!(reason = %reason, "Skipping virality enrichment");
            metrics::record_enrichment("skipped");
        }
    }
    outcome
}
