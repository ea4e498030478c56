//! Notification subjects and bodies produced by the monitor.

use fleetwatch_core::alert::{AlertLevel, MetricAlert};
use fleetwatch_core::machine::Machine;
use fleetwatch_core::notifier::Notification;
use fleetwatch_core::types::Timestamp;
use serde_json::json;

fn machine_label(machine: &Machine) -> String {
    format!("{} ({})", machine.system_name, machine.location)
}

/// A machine stopped reporting.
pub fn offline(machine: &Machine, last_seen: Timestamp, now: Timestamp) -> Notification {
    let elapsed_secs = now.signed_duration_since(last_seen).num_seconds();
    Notification::at(
        format!("{} is OFFLINE", machine_label(machine)),
        json!({
            "event": "offline",
            "system_name": machine.system_name,
            "location": machine.location,
            "table_name": machine.table_name,
            "hostname": machine.hostname,
            "public_ip": machine.public_ip,
            "last_seen": last_seen,
            "silent_for_secs": elapsed_secs,
        }),
        now,
    )
}

/// A machine resumed reporting.
pub fn online(machine: &Machine, last_seen: Timestamp, now: Timestamp) -> Notification {
    Notification::at(
        format!("{} is back ONLINE", machine_label(machine)),
        json!({
            "event": "online",
            "system_name": machine.system_name,
            "location": machine.location,
            "table_name": machine.table_name,
            "hostname": machine.hostname,
            "public_ip": machine.public_ip,
            "last_seen": last_seen,
        }),
        now,
    )
}

/// A metric reached its configured threshold.
pub fn threshold(machine: &Machine, alert: &MetricAlert, now: Timestamp) -> Notification {
    let level = match alert.level {
        AlertLevel::Warning => "WARNING",
        AlertLevel::Critical => "CRITICAL",
    };
    Notification::at(
        format!(
            "{level}: {} at {:.1} (threshold {:.1}) on {}",
            alert.metric_label(),
            alert.current_value,
            alert.threshold_value,
            machine_label(machine)
        ),
        json!({
            "event": "threshold",
            "system_name": machine.system_name,
            "location": machine.location,
            "alert": alert,
        }),
        now,
    )
}
