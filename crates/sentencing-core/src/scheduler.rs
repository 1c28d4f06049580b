//! Enqueues import tasks on Cloud Tasks.
//!
//! The task is an authenticated HTTP call back into `/handle_import`; retries
//! and backoff belong to the queue, never to this module.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub const CLOUD_TASKS_API_BASE: &str = "https://cloudtasks.googleapis.com";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Body of the deferred `/handle_import` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTask {
    pub bucket_id: String,
    pub object_id: String,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler configuration error: {0}")]
    Configuration(String),

    #[error("failed to obtain access token: {0}")]
    Token(String),

    #[error("task request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("task queue rejected task with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn schedule(&self, task: &ImportTask) -> Result<(), SchedulerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudTasksConfig {
    pub project_id: String,
    pub location: String,
    pub queue: String,
    /// URL of `/handle_import` the task calls.
    pub handler_url: String,
    /// Identity asserted by the task's OIDC token.
    pub service_account_email: String,
    /// Audience of the task's OIDC token; Cloud Tasks uses the URL when unset.
    pub audience: Option<String>,
    pub api_base: String,
}

impl CloudTasksConfig {
    fn validate(&self) -> Result<(), SchedulerError> {
        let missing: Vec<&str> = [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("queue", &self.queue),
            ("handler_url", &self.handler_url),
            ("service_account_email", &self.service_account_email),
            ("api_base", &self.api_base),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::Configuration(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue
        )
    }
}

/// Supplies OAuth access tokens for the Cloud Tasks API.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, SchedulerError>;
}

/// A fixed token, for local runs against a real queue.
#[derive(Debug, Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticAccessToken {
    async fn access_token(&self) -> Result<String, SchedulerError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Tokens for the runtime service account from the GCE metadata server.
pub struct MetadataServerToken {
    client: reqwest::Client,
    url: String,
    cached: RwLock<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new() -> Result<Self, SchedulerError> {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, SchedulerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            cached: RwLock::new(None),
        })
    }
}

#[async_trait]
impl AccessTokenSource for MetadataServerToken {
    async fn access_token(&self) -> Result<String, SchedulerError> {
        {
            let cached = self.cached.read();
            if let Some(entry) = cached.as_ref() {
                if entry.expires_at > Instant::now() {
                    return Ok(entry.token.clone());
                }
            }
        }

        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| SchedulerError::Token(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SchedulerError::Token(format!(
                "metadata server returned HTTP {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| SchedulerError::Token(e.to_string()))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.cached.write() = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

pub struct CloudTasksScheduler {
    client: reqwest::Client,
    config: CloudTasksConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl CloudTasksScheduler {
    /// Fails when any queue setting is empty, so a misconfigured server never
    /// starts accepting notifications.
    pub fn new(
        config: CloudTasksConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            config,
            tokens,
        })
    }

    fn task_body(&self, task: &ImportTask) -> Result<serde_json::Value, SchedulerError> {
        let payload = serde_json::to_vec(task)
            .map_err(|e| SchedulerError::Configuration(format!("unserializable task: {e}")))?;
        let audience = self
            .config
            .audience
            .clone()
            .unwrap_or_else(|| self.config.handler_url.clone());

        Ok(json!({
            "task": {
                "httpRequest": {
                    "httpMethod": "POST",
                    "url": self.config.handler_url,
                    "headers": { "Content-Type": "application/json" },
                    "body": BASE64.encode(payload),
                    "oidcToken": {
                        "serviceAccountEmail": self.config.service_account_email,
                        "audience": audience,
                    }
                }
            }
        }))
    }
}

#[async_trait]
impl TaskScheduler for CloudTasksScheduler {
    async fn schedule(&self, task: &ImportTask) -> Result<(), SchedulerError> {
        let url = format!(
            "{}/v2/{}/tasks",
            self.config.api_base.trim_end_matches('/'),
            self.config.queue_path()
        );
        let body = self.task_body(task)?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            bucket_id = task.bucket_id.as_str(),
            object_id = task.object_id.as_str(),
            queue = self.config.queue.as_str(),
            "import task enqueued"
        );
        Ok(())
    }
}
