//! Liveness and threshold monitor.
//!
//! A single serialized polling loop: each cycle reads the registry,
//! classifies every reporting machine, persists and announces online/offline
//! edges, then checks the latest sample of every online machine against the
//! alert thresholds under a per-key cooldown.

pub mod config;
pub mod cycle;
pub mod messages;
pub mod notifiers;
pub mod scheduler;

pub use config::MonitorConfig;
pub use cycle::{CycleReport, Monitor};
pub use scheduler::MonitorScheduler;
