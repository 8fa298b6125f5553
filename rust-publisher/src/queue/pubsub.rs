//! Google Cloud Pub/Sub transport over the REST API.
//!
//! Reference: https://cloud.google.com/pubsub/docs/reference/rest/v1/projects.topics/publish

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::batch::BatchSink;
use super::publisher::PublishError;
use super::types::{OutboundMessage, PublishAttributes};
use crate::config::{Config, ServiceAccount};

pub const PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

pub const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// How requests are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Application default credentials via `gcp_auth`.
    ApplicationDefault,
    /// An explicit service account key.
    ServiceAccount(ServiceAccount),
    /// No token, for the local emulator.
    None,
}

impl Credentials {
    fn label(&self) -> &'static str {
        match self {
            Credentials::ApplicationDefault => "application_default",
            Credentials::ServiceAccount(_) => "service_account",
            Credentials::None => "none",
        }
    }
}

/// Key file contents `gcp_auth` expects for a service account.
fn service_account_json(account: &ServiceAccount) -> String {
    json!({
        "type": "service_account",
        "client_email": account.client_email,
        "private_key": account.private_key,
        "token_uri": GOOGLE_TOKEN_URI,
    })
    .to_string()
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    messages: Vec<PubsubMessage<'a>>,
}

#[derive(Serialize)]
struct PubsubMessage<'a> {
    data: String,
    attributes: &'a PublishAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes batches to one topic.
pub struct PubSubClient {
    http_client: Client,
    publish_url: Url,
    topic: String,
    credentials: Credentials,
    token_provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl PubSubClient {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        topic_id: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let topic = format!("projects/{}/topics/{}", project_id, topic_id);
        let publish_url = Url::parse(endpoint)
            .with_context(|| format!("Invalid Pub/Sub endpoint: {}", endpoint))?
            .join(&format!("v1/{}:publish", topic))
            .context("Failed to build publish URL")?;

        // Service account keys are parsed here; a bad key is a construction error.
        let token_provider = match &credentials {
            Credentials::ServiceAccount(account) => {
                let provider = CustomServiceAccount::from_json(&service_account_json(account))
                    .context("Invalid service account credentials")?;
                OnceCell::new_with(Some(Arc::new(provider) as Arc<dyn TokenProvider>))
            }
            _ => OnceCell::new(),
        };

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            topic = %topic,
            publish_url = %publish_url,
            credentials = credentials.label(),
            "pubsub_client_created"
        );

        Ok(Self {
            http_client,
            publish_url,
            topic,
            credentials,
            token_provider,
        })
    }

    /// Client for the configured topic, or the emulator when one is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (endpoint, credentials) = match (&config.pubsub_emulator_host, &config.service_account) {
            (Some(host), _) => (format!("http://{}", host), Credentials::None),
            (None, Some(account)) => (
                PUBSUB_ENDPOINT.to_string(),
                Credentials::ServiceAccount(account.clone()),
            ),
            (None, None) => {
                info!("Using Application Default Credentials (ADC) for authentication");
                (PUBSUB_ENDPOINT.to_string(), Credentials::ApplicationDefault)
            }
        };

        Self::new(
            &endpoint,
            &config.project_id,
            &config.topic_id,
            credentials,
            config.publish_timeout,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn bearer_token(&self) -> Result<Option<String>, PublishError> {
        if matches!(self.credentials, Credentials::None) {
            return Ok(None);
        }

        let provider = self
            .token_provider
            .get_or_try_init(|| async { gcp_auth::provider().await })
            .await
            .map_err(|e| PublishError::Unauthorized(e.to_string()))?;

        let token = provider
            .token(&[PUBSUB_SCOPE])
            .await
            .map_err(|e| PublishError::Unauthorized(e.to_string()))?;

        Ok(Some(token.as_str().to_string()))
    }
}

#[async_trait]
impl BatchSink for PubSubClient {
    async fn send_batch(&self, messages: &[OutboundMessage]) -> Result<Vec<String>, PublishError> {
        let body = PublishRequest {
            messages: messages
                .iter()
                .map(|m| PubsubMessage {
                    data: BASE64.encode(&m.data),
                    attributes: &m.attributes,
                })
                .collect(),
        };

        let mut request = self.http_client.post(self.publish_url.clone()).json(&body);
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        debug!(topic = %self.topic, batch_size = messages.len(), "pubsub_publishing");

        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                topic = %self.topic,
                status = status.as_u16(),
                body = %text,
                "pubsub_publish_rejected"
            );
            return Err(match status {
                StatusCode::NOT_FOUND => PublishError::TopicNotFound(self.topic.clone()),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    PublishError::Unauthorized(text)
                }
                _ => PublishError::Rejected {
                    status: status.as_u16(),
                    body: text,
                },
            });
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;

        info!(
            topic = %self.topic,
            message_ids = ?parsed.message_ids,
            "pubsub_batch_published"
        );

        Ok(parsed.message_ids)
    }
}
