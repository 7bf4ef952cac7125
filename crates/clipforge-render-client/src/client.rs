//! Render worker HTTP dispatch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use clipforge_models::JobId;

use crate::error::{RenderClientError, RenderClientResult};

/// Configuration for the render worker client.
#[derive(Debug, Clone)]
pub struct RenderClientConfig {
    /// Dispatch endpoint; dispatch is disabled when unset
    pub endpoint: Option<String>,
    /// Per-dispatch timeout
    pub timeout: Duration,
    /// Shared secret sent with every dispatch
    pub credential: Option<String>,
}

impl Default for RenderClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(10),
            credential: None,
        }
    }
}

impl RenderClientConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("RENDER_WORKER_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("RENDER_DISPATCH_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            credential: std::env::var("WORKER_CREDENTIAL")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Body of a dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest<'a> {
    pub job_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<&'a str>,
}

/// Hands a queued job to the render worker.
#[async_trait]
pub trait RenderDispatcher: Send + Sync {
    async fn dispatch(&self, job_id: &JobId) -> RenderClientResult<()>;
}

/// Dispatches jobs over HTTP.
pub struct HttpRenderDispatcher {
    http: Client,
    config: RenderClientConfig,
}

impl HttpRenderDispatcher {
    pub fn new(config: RenderClientConfig) -> RenderClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RenderClientError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> RenderClientResult<Self> {
        Self::new(RenderClientConfig::from_env())
    }

    pub fn config(&self) -> &RenderClientConfig {
        &self.config
    }
}

#[async_trait]
impl RenderDispatcher for HttpRenderDispatcher {
    async fn dispatch(&self, job_id: &JobId) -> RenderClientResult<()> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or(RenderClientError::NotConfigured)?;

        let body = DispatchRequest {
            job_id: job_id.as_str(),
            credential: self.config.credential.as_deref(),
        };

        debug!(job_id = %job_id, endpoint = %endpoint, "Dispatching job to render worker");

        let response = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderClientError::Timeout(self.config.timeout.as_secs())
                } else {
                    RenderClientError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(job_id = %job_id, status = status.as_u16(), "Render worker rejected dispatch");
        if status.is_server_error() {
            Err(RenderClientError::ServiceUnavailable(format!("{}: {}", status, body)))
        } else {
            Err(RenderClientError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
