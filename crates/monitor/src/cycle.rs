//! One polling cycle of the liveness and threshold monitor.
//!
//! [`Monitor`] owns the liveness and cooldown state for its lifetime; two
//! monitors never share it. A cycle is a plain async call taking `now`, so
//! tests drive it with a synthetic clock.

use std::sync::Arc;
use std::time::Duration;

use fleetwatch_core::liveness::{classify, LivenessTracker, Transition};
use fleetwatch_core::machine::{Machine, MachineStatus};
use fleetwatch_core::notifier::{Notification, Notifier};
use fleetwatch_core::store::{MachineStore, StoreError};
use fleetwatch_core::thresholds::{evaluate_sample, AlertCooldownTracker, ThresholdConfig};
use fleetwatch_core::types::Timestamp;

use crate::config::MonitorConfig;
use crate::messages;

/// Counters for one completed cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Machines with a `last_seen`, i.e. liveness subjects.
    pub machines_checked: usize,
    pub went_offline: usize,
    pub came_online: usize,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
    /// Machines skipped because of a storage error scoped to them.
    pub sample_errors: usize,
}

impl CycleReport {
    /// Nothing happened beyond routine checks.
    pub fn is_quiet(&self) -> bool {
        self.went_offline == 0
            && self.came_online == 0
            && self.alerts_sent == 0
            && self.alerts_suppressed == 0
            && self.sample_errors == 0
    }
}

pub struct Monitor {
    store: Arc<dyn MachineStore>,
    notifier: Arc<dyn Notifier>,
    offline_after: Duration,
    thresholds: ThresholdConfig,
    liveness: LivenessTracker,
    cooldown: AlertCooldownTracker,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn MachineStore>,
        notifier: Arc<dyn Notifier>,
        offline_after: Duration,
        thresholds: ThresholdConfig,
    ) -> Self {
        let cooldown = AlertCooldownTracker::new(thresholds.cooldown);
        Self {
            store,
            notifier,
            offline_after,
            thresholds,
            liveness: LivenessTracker::new(),
            cooldown,
        }
    }

    pub fn from_config(
        store: Arc<dyn MachineStore>,
        notifier: Arc<dyn Notifier>,
        config: &MonitorConfig,
    ) -> Self {
        Self::new(store, notifier, config.offline_after, config.thresholds.clone())
    }

    pub fn liveness(&self) -> &LivenessTracker {
        &self.liveness
    }

    /// Run one cycle at `now`.
    ///
    /// A registry-level storage failure abandons the cycle and is returned;
    /// a failure scoped to one machine skips that machine and is counted in
    /// [`CycleReport::sample_errors`]. Notification failures never fail the
    /// cycle.
    pub async fn run_cycle(&mut self, now: Timestamp) -> Result<CycleReport, StoreError> {
        let machines = self.store.list_machines().await?;
        let mut report = CycleReport::default();

        for machine in &machines {
            let Some(last_seen) = machine.last_seen else {
                continue;
            };
            report.machines_checked += 1;

            match self.check_machine(machine, last_seen, now, &mut report).await {
                Ok(()) => {}
                Err(e) if e.is_registry_level() => return Err(e),
                Err(e) => {
                    report.sample_errors += 1;
                    tracing::warn!(
                        table_name = %machine.table_name,
                        error = %e,
                        "Skipping machine this cycle"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn check_machine(
        &mut self,
        machine: &Machine,
        last_seen: Timestamp,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<(), StoreError> {
        let status = self.update_liveness(machine, last_seen, now, report).await?;
        if status == MachineStatus::Online {
            self.check_thresholds(machine, now, report).await?;
        }
        Ok(())
    }

    /// Classify the machine, persist and announce any edge, and return the
    /// current status.
    async fn update_liveness(
        &mut self,
        machine: &Machine,
        last_seen: Timestamp,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<MachineStatus, StoreError> {
        let table = &machine.table_name;
        let current = classify(last_seen, now, self.offline_after);
        let observation = self.liveness.observe(table, machine.status, current);

        if observation.seeded {
            tracing::warn!(
                table_name = %table,
                persisted = %observation.previous,
                current = %current,
                "Liveness state seeded from registry; transitions missed while the monitor was down are not replayed"
            );
        }

        let Some(transition) = observation.transition else {
            self.liveness.record(table, current);
            return Ok(current);
        };

        // Remember the edge only once persisted; a failed write retries next cycle.
        self.store.set_status(table, current).await?;
        self.liveness.record(table, current);

        let notification = match transition {
            Transition::WentOffline => {
                report.went_offline += 1;
                tracing::warn!(
                    table_name = %table,
                    last_seen = %last_seen,
                    "Machine went offline"
                );
                messages::offline(machine, last_seen, now)
            }
            Transition::CameOnline => {
                report.came_online += 1;
                tracing::info!(table_name = %table, last_seen = %last_seen, "Machine came back online");
                messages::online(machine, last_seen, now)
            }
        };
        self.dispatch(&notification).await;

        Ok(current)
    }

    async fn check_thresholds(
        &mut self,
        machine: &Machine,
        now: Timestamp,
        report: &mut CycleReport,
    ) -> Result<(), StoreError> {
        let table = &machine.table_name;
        let Some(sample) = self.store.latest_sample(table).await? else {
            return Ok(());
        };

        let evaluation = evaluate_sample(table, &sample.data, &self.thresholds, &self.cooldown, now);

        for alert in &evaluation.suppressed {
            tracing::debug!(
                table_name = %table,
                metric = %alert.metric_label(),
                value = alert.current_value,
                "Alert suppressed by cooldown"
            );
        }
        report.alerts_suppressed += evaluation.suppressed.len();

        for alert in &evaluation.alerts {
            self.cooldown.mark_sent(table, &alert.key, now);
            report.alerts_sent += 1;
            tracing::warn!(
                table_name = %table,
                metric = %alert.metric_label(),
                value = alert.current_value,
                threshold = alert.threshold_value,
                level = ?alert.level,
                "Threshold breached"
            );
            self.dispatch(&messages::threshold(machine, alert, now)).await;
        }

        Ok(())
    }

    async fn dispatch(&self, notification: &Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::error!(
                channel = self.notifier.channel(),
                subject = %notification.subject,
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}
