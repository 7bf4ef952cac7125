//! Discovery timeouts and limits.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Bound on the content-generation call
    pub ai_timeout: Duration,
    /// Bound on the enrichment pass
    pub enrichment_timeout: Duration,
    /// Bound on the transcript fetch
    pub transcript_timeout: Duration,
    /// Minimum spacing the generation service is asked to keep between clips
    pub min_clip_gap_secs: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ai_timeout: Duration::from_secs(120),
            enrichment_timeout: Duration::from_secs(60),
            transcript_timeout: Duration::from_secs(30),
            min_clip_gap_secs: 30,
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ai_timeout: env_secs("AI_TIMEOUT_SECS").unwrap_or(defaults.ai_timeout),
            enrichment_timeout: env_secs("ENRICHMENT_TIMEOUT_SECS")
                .unwrap_or(defaults.enrichment_timeout),
            transcript_timeout: env_secs("TRANSCRIPT_TIMEOUT_SECS")
                .unwrap_or(defaults.transcript_timeout),
            min_clip_gap_secs: std::env::var("MIN_CLIP_GAP_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_clip_gap_secs),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("AI_TIMEOUT_SECS", "5");
        std::env::set_var("MIN_CLIP_GAP_SECS", "not-a-number");

        let config = DiscoveryConfig::from_env();
        assert_eq!(config.ai_timeout, Duration::from_secs(5));
        assert_eq!(config.enrichment_timeout, Duration::from_secs(60));
        assert_eq!(config.min_clip_gap_secs, 30);

        std::env::remove_var("AI_TIMEOUT_SECS");
        std::env::remove_var("MIN_CLIP_GAP_SECS");
    }
}
