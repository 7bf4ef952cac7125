//! Clip discovery for long-form videos.
//!
//! This crate provides:
//! - Duration-aware clip-count bands and transcript sampling
//! - The candidate analyzer with its deterministic fallback generator
//! - First-fit overlap resolution and best-effort score enrichment
//! - Gemini and metadata-provider HTTP clients

pub mod analyzer;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fallback;
pub mod gemini;
pub mod generator;
pub mod metadata;
pub mod metrics;
pub mod prompt;
pub mod resolver;
pub mod response;
pub mod sampler;
pub mod scorer;

pub use analyzer::{AnalysisInput, CandidateAnalyzer, FallbackReason, GenerationOutcome};
pub use config::DiscoveryConfig;
pub use discovery::{ClipDiscovery, DiscoveryOutput};
pub use error::{DiscoveryError, DiscoveryResult};
pub use gemini::{GeminiClient, GeminiConfig};
pub use generator::{ContentGenerator, ViralityScorer};
pub use metadata::{
    fetch_transcript_or_empty, HttpMetadataProvider, MetadataConfig, VideoDetails, VideoMetadataProvider,
};
pub use response::GenerationRequest;
pub use sampler::ClipCountRange;
pub use scorer::EnrichmentOutcome;
