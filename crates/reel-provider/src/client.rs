//! Replicate-style HTTP client for the generation provider.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use reel_models::RunRef;

use crate::error::{ProviderError, ProviderResult};
use crate::types::{ProviderOutput, ProviderState, RunSnapshot, RunTiming, VideoGenInput};

/// Abstraction over the generation provider.
///
/// Held as a trait object by the reconciliation engine so tests can
/// substitute scripted doubles.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit a video generation run; returns the provider's run reference
    /// immediately.
    async fn submit_video(&self, input: &VideoGenInput) -> ProviderResult<RunRef>;

    /// Pull the current state of a run.
    async fn poll(&self, run_ref: &RunRef) -> ProviderResult<RunSnapshot>;
}

/// Configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    pub base_url: String,
    /// API token sent as a bearer credential.
    pub api_token: String,
    /// Model version identifier submitted with each run.
    pub model_version: String,
    /// Callback URL the provider pushes completion events to, if set.
    pub webhook_url: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// Max retries for transient transport failures.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com".to_string(),
            api_token: String::new(),
            model_version: "minimax/video-01".to_string(),
            webhook_url: None,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.replicate.com".to_string()),
            api_token: std::env::var("PROVIDER_API_TOKEN").unwrap_or_default(),
            model_version: std::env::var("PROVIDER_VIDEO_MODEL")
                .unwrap_or_else(|_| "minimax/video-01".to_string()),
            webhook_url: std::env::var("PROVIDER_WEBHOOK_URL").ok(),
            timeout: Duration::from_secs(
                std::env::var("PROVIDER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("PROVIDER_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Prediction resource as returned by the provider API.
#[derive(Debug, Deserialize)]
struct PredictionResource {
    id: String,
    status: ProviderState,
    #[serde(default)]
    output: Option<Value>,
    error: Option<String>,
    #[serde(default)]
    input: Option<Value>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl PredictionResource {
    fn into_snapshot(self) -> RunSnapshot {
        RunSnapshot {
            run_ref: RunRef::from_string(self.id),
            state: self.status,
            output: ProviderOutput::from_raw(self.output.as_ref()),
            error: self.error,
            input_echo: self.input,
            timing: RunTiming {
                started_at: self.started_at,
                completed_at: self.completed_at,
            },
        }
    }
}

/// HTTP client for a Replicate-compatible prediction API.
pub struct ReplicateClient {
    http: Client,
    config: ProviderConfig,
}

impl ReplicateClient {
    /// Create a new provider client.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ProviderConfig::from_env())
    }

    fn predictions_url(&self) -> String {
        format!("{}/v1/predictions", self.config.base_url)
    }

    /// Execute with retry on transient transport failures.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> ProviderResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = ProviderResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Provider request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ProviderError::RequestFailed("Unknown error".to_string())))
    }

    async fn read_prediction(&self, response: reqwest::Response) -> ProviderResult<RunSnapshot> {
        let resource: PredictionResource = response.json().await?;
        Ok(resource.into_snapshot())
    }
}

#[async_trait]
impl GenerationProvider for ReplicateClient {
    async fn submit_video(&self, input: &VideoGenInput) -> ProviderResult<RunRef> {
        let url = self.predictions_url();

        let mut body = json!({
            "version": self.config.model_version,
            "input": {
                "prompt": input.prompt,
                "first_frame_image": input.image_url,
                "duration": input.duration_sec,
            },
        });
        if let Some(webhook) = &self.config.webhook_url {
            body["webhook"] = json!(webhook);
            body["webhook_events_filter"] = json!(["completed"]);
        }

        debug!(url = %url, "submitting video generation run");

        let response = self
            .with_retry(|| async {
                self.http
                    .post(&url)
                    .bearer_auth(&self.config.api_token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(ProviderError::Network)
            })
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::ServiceUnavailable(format!(
                "provider returned {}",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SubmissionRejected(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let snapshot = self.read_prediction(response).await?;
        Ok(snapshot.run_ref)
    }

    async fn poll(&self, run_ref: &RunRef) -> ProviderResult<RunSnapshot> {
        let url = format!("{}/{}", self.predictions_url(), run_ref);

        let response = self
            .with_retry(|| async {
                let resp = self
                    .http
                    .get(&url)
                    .bearer_auth(&self.config.api_token)
                    .send()
                    .await
                    .map_err(ProviderError::Network)?;
                if resp.status().is_server_error() {
                    return Err(ProviderError::ServiceUnavailable(format!(
                        "provider returned {}",
                        resp.status()
                    )));
                }
                Ok(resp)
            })
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::RunNotFound(run_ref.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        self.read_prediction(response).await
    }
}
