//! Per-user action rate limiting.
//!
//! Limits live in process memory and reset on restart. They protect expensive
//! operations against bursts; they are not an accounting quota.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::config::{ActionQuota, PipelineConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Rate limiter keyed by user id.
pub type UserRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limited operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitedAction {
    Analyze,
    Export,
    Batch,
}

impl RateLimitedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitedAction::Analyze => "analyze",
            RateLimitedAction::Export => "export",
            RateLimitedAction::Batch => "batch",
        }
    }
}

impl std::fmt::Display for RateLimitedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One keyed limiter per action.
pub struct ActionRateLimiter {
    analyze: UserRateLimiter,
    export: UserRateLimiter,
    batch: UserRateLimiter,
    clock: DefaultClock,
}

impl ActionRateLimiter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            analyze: RateLimiter::keyed(to_quota(config.analyze_quota)),
            export: RateLimiter::keyed(to_quota(config.export_quota)),
            batch: RateLimiter::keyed(to_quota(config.batch_quota)),
            clock: DefaultClock::default(),
        }
    }

    fn limiter(&self, action: RateLimitedAction) -> &UserRateLimiter {
        match action {
            RateLimitedAction::Analyze => &self.analyze,
            RateLimitedAction::Export => &self.export,
            RateLimitedAction::Batch => &self.batch,
        }
    }

    /// Consume one unit of `action` for `user_id`.
    pub fn check(&self, action: RateLimitedAction, user_id: &str) -> PipelineResult<()> {
        match self.limiter(action).check_key(&user_id.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                let retry_after_secs = wait.as_secs().max(1);
                warn!(
                    user_id = %user_id,
                    action = action.as_str(),
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                metrics::record_rate_limit_hit(action.as_str());
                Err(PipelineError::RateLimited {
                    action: action.as_str(),
                    retry_after_secs,
                })
            }
        }
    }

    /// Drop state for users whose allowance is fully replenished.
    pub fn prune(&self) {
        for limiter in [&self.analyze, &self.export, &self.batch] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }
}

/// Spread `max_requests` evenly over `window`, allowing the whole allowance as a burst.
fn to_quota(quota: ActionQuota) -> Quota {
    let burst = NonZeroU32::new(quota.max_requests).unwrap_or(NonZeroU32::MIN);
    let period = (quota.window / burst.get()).max(Duration::from_millis(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
