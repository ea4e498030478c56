//! Fleetwatch notification delivery.
//!
//! Implementations of [`fleetwatch_core::notifier::Notifier`]:
//!
//! - [`EmailNotifier`]: SMTP via `lettre`, one message per recipient.
//! - [`WebhookNotifier`]: JSON POST with exponential-backoff retry.
//! - [`LogNotifier`]: structured log line, always available.
//! - [`FanoutNotifier`]: delivers to every configured channel concurrently,
//!   each under its own timeout.

pub mod delivery;
pub mod fanout;

pub use delivery::email::{EmailConfig, EmailNotifier};
pub use delivery::log::LogNotifier;
pub use delivery::webhook::WebhookNotifier;
pub use fanout::FanoutNotifier;
