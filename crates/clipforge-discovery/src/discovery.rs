//! End-to-end clip discovery: analyze, resolve overlaps, cap, enrich.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use clipforge_models::{Clip, ClipAiData};

use crate::analyzer::{AnalysisInput, CandidateAnalyzer, FallbackReason};
use crate::config::DiscoveryConfig;
use crate::generator::{ContentGenerator, ViralityScorer};
use crate::metrics;
use crate::resolver::{cap_clip_count, resolve_overlaps, sort_by_score};
use crate::sampler::ClipCountRange;
use crate::scorer::{enrich_clips, EnrichmentOutcome};

/// Final discovery result for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOutput {
    /// Non-overlapping clips, highest score first
    pub clips: Vec<Clip>,
    pub ai_data: HashMap<String, ClipAiData>,
    pub overall_assessment: Option<String>,
    pub topics: Vec<String>,
    pub range: ClipCountRange,
    pub fallback_reason: Option<FallbackReason>,
    pub enriched: bool,
}

impl DiscoveryOutput {
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

pub struct ClipDiscovery {
    analyzer: CandidateAnalyzer,
    scorer: Option<Arc<dyn ViralityScorer>>,
    config: DiscoveryConfig,
}

impl ClipDiscovery {
    pub fn new(
        generator: Option<Arc<dyn ContentGenerator>>,
        scorer: Option<Arc<dyn ViralityScorer>>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            analyzer: CandidateAnalyzer::new(generator, config.clone()),
            scorer,
            config,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub async fn discover(&self, input: &AnalysisInput<'_>) -> DiscoveryOutput {
        let analysis = self.analyzer.analyze(input).await;
        let candidate_count = analysis.candidates.len();

        let resolved = resolve_overlaps(analysis.candidates);
        let resolved_count = resolved.len();
        let mut clips = cap_clip_count(resolved, analysis.range.max_clips);

        let enrichment = enrich_clips(
            self.scorer.as_deref(),
            input.video_title,
            &mut clips,
            self.config.enrichment_timeout,
        )
        .await;

        let breakdowns = match enrichment {
            EnrichmentOutcome::Applied(breakdowns) => {
                sort_by_score(&mut clips);
                Some(breakdowns)
            }
            EnrichmentOutcome::Skipped(_) => None,
        };

        let from_fallback = analysis.fallback.is_some();
        let mut summaries = analysis.summaries;
        let ai_data = clips
            .iter()
            .map(|clip| {
                let data = ClipAiData {
                    transcript_summary: summaries.remove(&clip.id),
                    virality: breakdowns.as_ref().and_then(|b| b.get(&clip.id).cloned()),
                    from_fallback,
                };
                (clip.id.clone(), data)
            })
            .collect();

        info!(
            candidates = candidate_count,
            after_overlap = resolved_count,
            kept = clips.len(),
            fallback = from_fallback,
            enriched = breakdowns.is_some(),
            "Clip discovery finished"
        );
        metrics::record_clips_discovered(clips.len(), if from_fallback { "fallback" } else { "ai" });

        DiscoveryOutput {
            clips,
            ai_data,
            overall_assessment: analysis.overall_assessment,
            topics: analysis.topics,
            range: analysis.range,
            fallback_reason: analysis.fallback,
            enriched: breakdowns.is_some(),
        }
    }
}
