//! Background loop driving [`Monitor::run_cycle`] on a fixed interval.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cycle::Monitor;

/// Runs one monitor cycle per tick until cancelled.
///
/// Cycles never overlap: a slow cycle delays the next tick instead of
/// queueing a burst of catch-up cycles.
pub struct MonitorScheduler {
    monitor: Monitor,
    interval: Duration,
}

impl MonitorScheduler {
    pub fn new(monitor: Monitor, interval: Duration) -> Self {
        Self { monitor, interval }
    }

    /// Run the monitor loop.
    ///
    /// The first cycle runs immediately. The loop exits when the provided
    /// [`CancellationToken`] is cancelled. Cancellation is only observed
    /// between cycles: a cycle already running completes first, so callers
    /// bound shutdown with their own timeout.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "Monitor scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Monitor scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        match self.monitor.run_cycle(Utc::now()).await {
            Ok(report) if report.is_quiet() => {
                tracing::debug!(machines = report.machines_checked, "Monitor cycle complete");
            }
            Ok(report) => {
                tracing::info!(
                    machines = report.machines_checked,
                    went_offline = report.went_offline,
                    came_online = report.came_online,
                    alerts_sent = report.alerts_sent,
                    alerts_suppressed = report.alerts_suppressed,
                    sample_errors = report.sample_errors,
                    "Monitor cycle complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Monitor cycle abandoned");
            }
        }
    }
}
