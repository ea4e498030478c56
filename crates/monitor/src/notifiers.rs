use std::sync::Arc;

use fleetwatch_events::{EmailConfig, EmailNotifier, FanoutNotifier, LogNotifier, WebhookNotifier};

use crate::config::MonitorConfig;

/// Assemble the delivery channels the configuration enables.
///
/// The log channel is always present. Email needs both recipients and an
/// SMTP configuration; a channel that fails to build is skipped with a
/// warning so the monitor still starts.
pub fn build_notifier(config: &MonitorConfig, email: Option<EmailConfig>) -> FanoutNotifier {
    let mut fanout = FanoutNotifier::new(config.notify_timeout).with_channel(Arc::new(LogNotifier));

    match (email, config.alert_email_to.is_empty()) {
        (Some(email), false) => match EmailNotifier::new(&email, &config.alert_email_to) {
            Ok(notifier) => fanout = fanout.with_channel(Arc::new(notifier)),
            Err(e) => tracing::warn!(error = %e, "Email alerts disabled"),
        },
        (None, false) => {
            tracing::warn!("ALERT_EMAIL_TO is set but SMTP_HOST is not; email alerts disabled");
        }
        (_, true) => {}
    }

    if let Some(url) = &config.alert_webhook_url {
        match WebhookNotifier::new(url) {
            Ok(notifier) => fanout = fanout.with_channel(Arc::new(notifier)),
            Err(e) => tracing::warn!(error = %e, "Webhook alerts disabled"),
        }
    }

    tracing::info!(channels = ?fanout.channel_names(), "Notification channels configured");
    fanout
}
