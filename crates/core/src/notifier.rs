//! Outbound notification seam.
//!
//! The monitor only knows [`Notifier`]; SMTP, webhook and log delivery live
//! in `fleetwatch-events`. Delivery is best-effort: callers log a
//! [`NotifyError`] and move on.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::types::Timestamp;

/// A notification ready for delivery: a one-line subject plus a structured
/// body that each channel renders in its own way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: serde_json::Value) -> Self {
        Self::at(subject, body, Utc::now())
    }

    pub fn at(subject: impl Into<String>, body: serde_json::Value, timestamp: Timestamp) -> Self {
        Self {
            subject: subject.into(),
            body,
            timestamp,
        }
    }

    /// Plain-text rendering used by the email and log channels.
    pub fn render_text(&self) -> String {
        let details = serde_json::to_string_pretty(&self.body).unwrap_or_default();
        format!(
            "{}\nTime: {}\n\n{}",
            self.subject,
            self.timestamp.to_rfc3339(),
            details
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("{channel} delivery failed: {message}")]
    Delivery { channel: String, message: String },

    #[error("{channel} delivery timed out after {timeout_secs}s")]
    Timeout { channel: String, timeout_secs: u64 },
}

/// A destination for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs (`email`, `webhook`, ...).
    fn channel(&self) -> &str;

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}
