//! Log-only delivery channel.
//!
//! Always part of the fan-out so alerts remain visible in the service log
//! when no external transport is configured.

use async_trait::async_trait;
use fleetwatch_core::notifier::{Notification, Notifier, NotifyError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn channel(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            subject = %notification.subject,
            body = %notification.body,
            timestamp = %notification.timestamp,
            "Notification"
        );
        Ok(())
    }
}
