//! Seams to the external content-generation service.

use std::collections::HashMap;

use async_trait::async_trait;

use clipforge_models::{Clip, ViralityBreakdown};

use crate::error::DiscoveryResult;
use crate::response::GenerationRequest;

/// Proposes clip candidates. Returns the raw service text; parsing is the caller's job.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> DiscoveryResult<String>;
}

/// Produces richer score breakdowns for accepted clips, keyed by clip id.
#[async_trait]
pub trait ViralityScorer: Send + Sync {
    async fn score(
        &self,
        video_title: &str,
        clips: &[Clip],
    ) -> DiscoveryResult<HashMap<String, ViralityBreakdown>>;
}
