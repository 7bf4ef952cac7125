//! Video metadata and transcript provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clipforge_models::{Transcript, TranscriptSegment};

use crate::error::{DiscoveryError, DiscoveryResult};

/// Basic facts about a hosted video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub title: String,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait VideoMetadataProvider: Send + Sync {
    async fn fetch_details(&self, video_id: &str) -> DiscoveryResult<VideoDetails>;

    async fn fetch_transcript(&self, video_id: &str) -> DiscoveryResult<Transcript>;
}

/// Fetch a transcript within `timeout`. Any failure yields an empty transcript.
pub async fn fetch_transcript_or_empty(
    provider: &dyn VideoMetadataProvider,
    video_id: &str,
    timeout: Duration,
) -> Transcript {
    match tokio::time::timeout(timeout, provider.fetch_transcript(video_id)).await {
        Ok(Ok(transcript)) => transcript,
        Ok(Err(e)) => {
            warn!(video_id = %video_id, error = %e, "Transcript fetch failed, continuing without transcript");
            Transcript::empty()
        }
        Err(_) => {
            warn!(
                video_id = %video_id,
                timeout_secs = timeout.as_secs(),
                "Transcript fetch timed out, continuing without transcript"
            );
            Transcript::empty()
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl MetadataConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("METADATA_SERVICE_URL")
                .ok()
                .map(|s| s.trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("METADATA_API_KEY").ok().filter(|s| !s.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("TRANSCRIPT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptPayload {
    Wrapped { segments: Vec<TranscriptSegment> },
    Bare(Vec<TranscriptSegment>),
}

/// HTTP metadata provider.
///
/// `GET {base}/videos/{id}` returns [`VideoDetails`];
/// `GET {base}/videos/{id}/transcript` returns `{"segments": [{start, duration, text}]}`.
pub struct HttpMetadataProvider {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMetadataProvider {
    pub fn new(config: MetadataConfig) -> DiscoveryResult<Self> {
        let base_url = config
            .base_url
            .ok_or_else(|| DiscoveryError::not_configured("METADATA_SERVICE_URL not set"))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DiscoveryError::Network)?;
        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
        })
    }

    pub fn from_env() -> DiscoveryResult<Self> {
        Self::new(MetadataConfig::from_env())
    }

    async fn get(&self, video_id: &str, suffix: &str) -> DiscoveryResult<reqwest::Response> {
        let url = format!(
            "{}/videos/{}{}",
            self.base_url,
            urlencoding::encode(video_id),
            suffix
        );
        debug!(url = %url, "Fetching video metadata");

        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;

        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(DiscoveryError::VideoNotFound(video_id.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(DiscoveryError::service_error(format!(
                    "metadata service returned {}: {}",
                    status, body
                )))
            }
        }
    }
}

#[async_trait]
impl VideoMetadataProvider for HttpMetadataProvider {
    async fn fetch_details(&self, video_id: &str) -> DiscoveryResult<VideoDetails> {
        let details: VideoDetails = self.get(video_id, "").await?.json().await?;
        if !details.duration_seconds.is_finite() || details.duration_seconds <= 0.0 {
            return Err(DiscoveryError::malformed(format!(
                "invalid duration {} for video {}",
                details.duration_seconds, video_id
            )));
        }
        Ok(details)
    }

    async fn fetch_transcript(&self, video_id: &str) -> DiscoveryResult<Transcript> {
        let payload: TranscriptPayload = self.get(video_id, "/transcript").await?.json().await?;
        let segments = match payload {
            TranscriptPayload::Wrapped { segments } => segments,
            TranscriptPayload::Bare(segments) => segments,
        };
        Ok(Transcript::new(segments))
    }
}
