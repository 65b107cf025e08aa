//! Webhook registration
//!
//! Each worker registers the broadcast public URL with an external
//! endpoint after activation and removes it on shutdown. Rate-limit and
//! bad-request responses are treated as transient (the external service
//! throttles bursts of simultaneous registrations) and retried on a
//! fixed backoff up to a bounded attempt budget.

use async_trait::async_trait;
use serde::Serialize;

use hive_core::config::WebhookConfig;
use hive_core::WebhookError;

/// Seam between the retry policy and the actual HTTP call, so tests
/// can inject failures
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Register `url` as the public webhook
    async fn register(&self, url: &str) -> Result<(), WebhookError>;

    /// Remove the current webhook registration
    async fn remove(&self) -> Result<(), WebhookError>;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    url: &'a str,
}

/// Registers the webhook by POSTing to a configured endpoint
pub struct HttpWebhook {
    http: reqwest::Client,
    register_url: String,
}

impl HttpWebhook {
    /// Create a registrar for `register_url`
    pub fn new(register_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            register_url,
        }
    }

    async fn post(&self, url: &str) -> Result<(), WebhookError> {
        let response = self
            .http
            .post(&self.register_url)
            .json(&RegisterRequest { url })
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(()),
            // 429: throttled; 400: the service rejects registrations
            // that race a previous removal, and accepts on retry
            429 | 400 => Err(WebhookError::Transient(status)),
            _ => Err(WebhookError::Rejected(status)),
        }
    }
}

#[async_trait]
impl WebhookRegistrar for HttpWebhook {
    async fn register(&self, url: &str) -> Result<(), WebhookError> {
        self.post(url).await
    }

    async fn remove(&self) -> Result<(), WebhookError> {
        // Registering the empty URL clears the webhook
        self.post("").await
    }
}

/// Drive registration through the configured retry budget.
///
/// Transient rejections sleep out the fixed backoff and retry; terminal
/// rejections and transport failures propagate immediately. Running out
/// of attempts is fatal for the calling worker.
pub async fn register_with_retry(
    registrar: &dyn WebhookRegistrar,
    url: &str,
    config: &WebhookConfig,
) -> Result<(), WebhookError> {
    for attempt in 1..=config.max_attempts {
        match registrar.register(url).await {
            Ok(()) => {
                tracing::info!("webhook registered: {}", url);
                return Ok(());
            }
            Err(WebhookError::Transient(status)) => {
                tracing::warn!(
                    "webhook registration attempt {}/{} rejected with {}, retrying",
                    attempt,
                    config.max_attempts,
                    status
                );
                tokio::time::sleep(config.backoff()).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(WebhookError::AttemptsExhausted {
        attempts: config.max_attempts,
    })
}
