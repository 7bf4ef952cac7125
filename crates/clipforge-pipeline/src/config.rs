//! Pipeline configuration.

use std::time::Duration;

/// Allowance of one action per user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionQuota {
    pub max_requests: u32,
    pub window: Duration,
}

impl ActionQuota {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Projects a user may keep before the oldest is evicted
    pub max_projects_per_user: usize,
    pub dispatch_sweep_interval: Duration,
    /// Queued jobs whose last dispatch is older than this are dispatched again
    pub dispatch_retry_after: Duration,
    /// Processing jobs silent for longer than this are failed; `None` disables detection
    pub stale_job_timeout: Option<Duration>,
    /// Jobs examined per sweep
    pub sweep_batch_size: usize,
    /// Lifetime of presigned upload and download URLs
    pub presign_ttl: Duration,
    pub analyze_quota: ActionQuota,
    pub export_quota: ActionQuota,
    pub batch_quota: ActionQuota,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_projects_per_user: 10,
            dispatch_sweep_interval: Duration::from_secs(60),
            dispatch_retry_after: Duration::from_secs(300),
            stale_job_timeout: None,
            sweep_batch_size: 100,
            presign_ttl: Duration::from_secs(3600),
            analyze_quota: ActionQuota::new(10, Duration::from_secs(3600)),
            export_quota: ActionQuota::new(30, Duration::from_secs(60)),
            batch_quota: ActionQuota::new(5, Duration::from_secs(60)),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_projects_per_user: env_parse("MAX_PROJECTS_PER_USER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_projects_per_user),
            dispatch_sweep_interval: env_parse("DISPATCH_SWEEP_INTERVAL_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.dispatch_sweep_interval),
            dispatch_retry_after: env_parse("DISPATCH_RETRY_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.dispatch_retry_after),
            stale_job_timeout: env_parse("STALE_JOB_TIMEOUT_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs),
            sweep_batch_size: env_parse("DISPATCH_SWEEP_BATCH_SIZE").unwrap_or(defaults.sweep_batch_size),
            presign_ttl: env_parse("PRESIGN_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.presign_ttl),
            analyze_quota: ActionQuota::new(
                env_parse("RATE_LIMIT_ANALYZE_PER_HOUR").unwrap_or(defaults.analyze_quota.max_requests),
                Duration::from_secs(3600),
            ),
            export_quota: ActionQuota::new(
                env_parse("RATE_LIMIT_EXPORT_PER_MINUTE").unwrap_or(defaults.export_quota.max_requests),
                Duration::from_secs(60),
            ),
            batch_quota: ActionQuota::new(
                env_parse("RATE_LIMIT_BATCH_PER_MINUTE").unwrap_or(defaults.batch_quota.max_requests),
                Duration::from_secs(60),
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
