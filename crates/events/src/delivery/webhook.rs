//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookNotifier`] sends a JSON-encoded [`Notification`] to an external
//! URL via HTTP POST. Failed attempts are retried up to three times with
//! exponential backoff (1 s, 2 s, 4 s). The fan-out timeout bounds the
//! whole sequence.

use std::time::Duration;

use async_trait::async_trait;
use fleetwatch_core::notifier::{Notification, Notifier, NotifyError};

const CHANNEL: &str = "webhook";

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// Delivers notifications to a single webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: RETRY_DELAYS_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
        })
    }

    /// Override the backoff schedule.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a payload with retry, returning on the first success.
    async fn deliver(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let mut last_err: Option<WebhookError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        error = %e,
                        "Webhook delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(payload).await {
            Ok(()) => Ok(()),
            Err(e) => Err(last_err.unwrap_or(e)),
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), WebhookError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

/// JSON body posted to the webhook.
fn webhook_payload(notification: &Notification) -> serde_json::Value {
    serde_json::json!({
        "subject": notification.subject,
        "body": notification.body,
        "timestamp": notification.timestamp,
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &str {
        CHANNEL
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.deliver(&webhook_payload(notification))
            .await
            .map_err(|e| NotifyError::Delivery {
                channel: CHANNEL.to_string(),
                message: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn new_builds_client() {
        let notifier = WebhookNotifier::new("http://localhost:9/hook").unwrap();
        assert_eq!(notifier.url(), "http://localhost:9/hook");
        assert_eq!(notifier.retry_delays.len(), 3);
    }

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn payload_carries_subject_and_body() {
        let notification = Notification::new("cpu_percent high on alpha", json!({"value": 95.0}));
        let payload = webhook_payload(&notification);
        assert_eq!(payload["subject"], "cpu_percent high on alpha");
        assert_eq!(payload["body"]["value"], 95.0);
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_delivery_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook")
            .unwrap()
            .with_retry_delays(vec![]);
        let err = notifier
            .notify(&Notification::new("test", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Delivery { ref channel, .. } if channel == "webhook"));
    }
}
