//! Background sweep that re-dispatches queued jobs and, when enabled,
//! fails jobs stuck in `processing`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::jobs::JobManager;
use crate::rate_limit::ActionRateLimiter;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub redispatched: usize,
    pub stale: usize,
}

pub struct DispatchSweeper {
    jobs: Arc<JobManager>,
    limiter: Option<Arc<ActionRateLimiter>>,
    interval: Duration,
    stale_timeout: Option<Duration>,
}

impl DispatchSweeper {
    pub fn new(jobs: Arc<JobManager>, config: &PipelineConfig) -> Self {
        Self {
            jobs,
            limiter: None,
            interval: config.dispatch_sweep_interval,
            stale_timeout: config.stale_job_timeout,
        }
    }

    /// Also prune idle rate limiter state on every sweep.
    pub fn with_rate_limiter(mut self, limiter: Arc<ActionRateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Run forever. Spawn as a background task.
    pub async fn run(&self) {
        info!(
            interval_secs = self.interval.as_secs(),
            stale_detection = self.stale_timeout.is_some(),
            "Starting dispatch sweeper"
        );

        let mut ticker = interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("Dispatch sweep error: {}", e);
            }
        }
    }

    pub async fn sweep_once(&self) -> PipelineResult<SweepReport> {
        let now = Utc::now();
        let redispatched = self.jobs.redispatch_queued(now).await?;
        let stale = match self.stale_timeout {
            Some(timeout) => self.jobs.expire_stale(now, timeout).await?,
            None => 0,
        };
        if let Some(limiter) = &self.limiter {
            limiter.prune();
        }

        let report = SweepReport { redispatched, stale };
        if report != SweepReport::default() {
            info!(
                redispatched = report.redispatched,
                stale = report.stale,
                "Dispatch sweep complete"
            );
        }
        Ok(report)
    }
}
