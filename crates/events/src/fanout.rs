//! Concurrent delivery to every configured channel.
//!
//! Each channel runs under its own `tokio::time::timeout`, so a hung SMTP
//! server cannot delay the webhook or the caller beyond the configured
//! bound. Failures are logged per channel and summarized in the returned
//! error; they never affect the other channels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetwatch_core::notifier::{Notification, Notifier, NotifyError};
use futures::future::join_all;

/// Default per-channel delivery timeout.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FanoutNotifier {
    channels: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
}

impl FanoutNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            channels: Vec::new(),
            timeout,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    async fn deliver_one(
        &self,
        channel: &Arc<dyn Notifier>,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        match tokio::time::timeout(self.timeout, channel.notify(notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                channel: channel.channel().to_string(),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

impl Default for FanoutNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFY_TIMEOUT)
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn channel(&self) -> &str {
        "fanout"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let results = join_all(
            self.channels
                .iter()
                .map(|channel| self.deliver_one(channel, notification)),
        )
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(Result::err)
            .inspect(|e| {
                tracing::error!(error = %e, subject = %notification.subject, "Notification delivery failed");
            })
            .map(|e| e.to_string())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::Delivery {
                channel: "fanout".to_string(),
                message: format!(
                    "{} of {} channels failed: {}",
                    failures.len(),
                    self.channels.len(),
                    failures.join("; ")
                ),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
