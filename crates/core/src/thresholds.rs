//! Threshold evaluation engine for machine samples.
//!
//! Pure logic, no database access. The caller fetches the latest sample of
//! each online machine and passes it in together with the cooldown tracker
//! it owns across polling cycles.

use std::collections::HashMap;
use std::time::Duration;

use crate::alert::{AlertKey, AlertLevel, MetricAlert};
use crate::identifier::TableName;
use crate::metric_names::{METRIC_CPU, METRIC_RAM, METRIC_TEMPERATURE};
use crate::telemetry::{DiskPartition, NewSample};
use crate::types::Timestamp;

/// Default minimum interval between repeated alerts for the same key.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(600);

/// Points above the threshold at which a breach becomes critical.
pub const CRITICAL_MARGIN: f64 = 10.0;

const EXCLUDED_DEVICE_PREFIXES: &[&str] = &["/dev/loop", "tmpfs", "overlay", "shm", "none"];

const EXCLUDED_FSTYPES: &[&str] = &[
    "tmpfs", "devtmpfs", "overlay", "squashfs", "proc", "sysfs", "cgroup", "cgroup2",
];

const EXCLUDED_MOUNT_PREFIXES: &[&str] = &[
    "/snap",
    "/run",
    "/sys",
    "/proc",
    "/dev",
    "/boot/efi",
    "/var/lib/docker",
];

/// Configured alert thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub temperature_c: f64,
    pub disk_percent: f64,
    pub cooldown: Duration,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu_percent: 90.0,
            ram_percent: 90.0,
            temperature_c: 85.0,
            disk_percent: 90.0,
            cooldown: DEFAULT_ALERT_COOLDOWN,
        }
    }
}

/// Composite key for alert cooldown tracking: (machine, metric or partition).
type CooldownKey = (TableName, AlertKey);

/// Tracks when the last alert was dispatched per machine + key to suppress
/// repeated alerts within the cooldown window.
#[derive(Debug)]
pub struct AlertCooldownTracker {
    window: chrono::Duration,
    last_alert: HashMap<CooldownKey, Timestamp>,
}

impl AlertCooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            last_alert: HashMap::new(),
        }
    }

    /// Whether an alert for `key` may be dispatched at `now`.
    ///
    /// Does not record anything; see [`mark_sent`](Self::mark_sent).
    pub fn is_allowed(&self, table: &TableName, key: &AlertKey, now: Timestamp) -> bool {
        match self.last_alert.get(&(table.clone(), key.clone())) {
            Some(last) => now.signed_duration_since(*last) >= self.window,
            None => true,
        }
    }

    /// Record a dispatch, overwriting any earlier entry for the key.
    pub fn mark_sent(&mut self, table: &TableName, key: &AlertKey, now: Timestamp) {
        self.last_alert.insert((table.clone(), key.clone()), now);
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}

impl Default for AlertCooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_COOLDOWN)
    }
}

/// Outcome of evaluating one sample.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Breaches that passed the cooldown and should be dispatched.
    pub alerts: Vec<MetricAlert>,
    /// Breaches held back by the cooldown.
    pub suppressed: Vec<MetricAlert>,
}

/// Whether a partition lives on a pseudo or virtual filesystem.
pub fn is_pseudo_partition(partition: &DiskPartition) -> bool {
    let device = partition.device.as_deref().unwrap_or_default();
    if EXCLUDED_DEVICE_PREFIXES
        .iter()
        .any(|prefix| device.starts_with(prefix))
    {
        return true;
    }

    if let Some(fstype) = partition.fstype.as_deref() {
        if EXCLUDED_FSTYPES.contains(&fstype) {
            return true;
        }
    }

    let mountpoint = partition.mountpoint.as_deref().unwrap_or_default();
    EXCLUDED_MOUNT_PREFIXES
        .iter()
        .any(|prefix| mountpoint == *prefix || mountpoint.starts_with(&format!("{prefix}/")))
}

/// Evaluate the latest sample of one machine against `config`.
///
/// The cooldown tracker is only consulted here; the caller marks alerts as
/// sent once they have been handed to the notifier.
pub fn evaluate_sample(
    table: &TableName,
    sample: &NewSample,
    config: &ThresholdConfig,
    cooldown: &AlertCooldownTracker,
    now: Timestamp,
) -> Evaluation {
    let mut breaches = Vec::new();

    let scalars = [
        (METRIC_CPU, Some(sample.cpu_percent), config.cpu_percent),
        (METRIC_RAM, Some(sample.ram_percent), config.ram_percent),
        (METRIC_TEMPERATURE, sample.cpu_temp, config.temperature_c),
    ];
    for (name, value, threshold) in scalars {
        if let Some(value) = value {
            check_threshold(
                table,
                AlertKey::Metric { name },
                value,
                threshold,
                sample.ts,
                &mut breaches,
            );
        }
    }

    for partition in &sample.disk_partitions {
        if is_pseudo_partition(partition) {
            continue;
        }
        // Partitions without a mountpoint or percent carry no usable value.
        let (Some(mountpoint), Some(percent)) = (&partition.mountpoint, partition.percent) else {
            continue;
        };
        check_threshold(
            table,
            AlertKey::Disk {
                mountpoint: mountpoint.clone(),
            },
            percent,
            config.disk_percent,
            sample.ts,
            &mut breaches,
        );
    }

    let (alerts, suppressed) = worst_per_key(breaches)
        .into_iter()
        .partition(|alert| cooldown.is_allowed(table, &alert.key, now));

    Evaluation { alerts, suppressed }
}

/// Collapse breaches sharing a key (a mountpoint reported twice) into the
/// one with the highest value, keeping first-seen order.
fn worst_per_key(breaches: Vec<MetricAlert>) -> Vec<MetricAlert> {
    let mut kept: Vec<MetricAlert> = Vec::with_capacity(breaches.len());
    for alert in breaches {
        match kept.iter_mut().find(|existing| existing.key == alert.key) {
            Some(existing) if alert.current_value > existing.current_value => *existing = alert,
            Some(_) => {}
            None => kept.push(alert),
        }
    }
    kept
}

/// Compare a single metric value against a threshold and push an alert if breached.
fn check_threshold(
    table: &TableName,
    key: AlertKey,
    value: f64,
    threshold: f64,
    timestamp: Timestamp,
    alerts: &mut Vec<MetricAlert>,
) {
    if !value.is_finite() || value < threshold {
        return;
    }
    let level = if value >= threshold + CRITICAL_MARGIN {
        AlertLevel::Critical
    } else {
        AlertLevel::Warning
    };

    alerts.push(MetricAlert {
        table_name: table.clone(),
        key,
        current_value: value,
        threshold_value: threshold,
        level,
        timestamp,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn table() -> TableName {
        TableName::derive("alpha", "lab1")
    }

    fn partition(mountpoint: &str, device: &str, fstype: &str, percent: f64) -> DiskPartition {
        DiskPartition {
            mountpoint: Some(mountpoint.to_string()),
            device: Some(device.to_string()),
            fstype: Some(fstype.to_string()),
            total_gb: Some(100.0),
            used_gb: Some(percent),
            free_gb: Some(100.0 - percent),
            percent: Some(percent),
            extra: Default::default(),
        }
    }

    fn make_sample(cpu: f64, ram: f64, temp: Option<f64>, disks: Vec<DiskPartition>) -> NewSample {
        NewSample {
            ts: Utc::now(),
            cpu_percent: cpu,
            cpu_per_core: vec![cpu],
            cpu_freq_mhz: 3000.0,
            cpu_temp: temp,
            ram_total_gb: 16.0,
            ram_used_gb: 8.0,
            ram_percent: ram,
            swap_total_gb: 0.0,
            swap_used_gb: 0.0,
            swap_percent: 0.0,
            gpu_info: None,
            disk_partitions: disks,
            disk_io: None,
            net_bytes_sent: 0.0,
            net_bytes_recv: 0.0,
            net_packets_sent: 0.0,
            net_packets_recv: 0.0,
            public_ip: None,
            top_processes: vec![],
            uptime_seconds: 60.0,
            boot_time: "2026-01-01T00:00:00".to_string(),
            os_version: "6.1".to_string(),
            hostname: "alpha".to_string(),
            status: "online".to_string(),
        }
    }

    #[test]
    fn no_alerts_when_within_thresholds() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(50.0, 40.0, Some(60.0), vec![partition("/", "/dev/sda1", "ext4", 40.0)]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert!(eval.alerts.is_empty());
        assert!(eval.suppressed.is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(90.0, 10.0, None, vec![]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert_eq!(eval.alerts.len(), 1);
        assert_eq!(eval.alerts[0].key, AlertKey::Metric { name: METRIC_CPU });
        assert_eq!(eval.alerts[0].level, AlertLevel::Warning);
    }

    #[test]
    fn critical_above_margin() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(10.0, 10.0, Some(96.0), vec![]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert_eq!(eval.alerts.len(), 1);
        assert_eq!(eval.alerts[0].key, AlertKey::Metric { name: METRIC_TEMPERATURE });
        assert_eq!(eval.alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn missing_temperature_is_skipped() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(10.0, 10.0, None, vec![]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert!(eval.alerts.is_empty());
    }

    #[test]
    fn multiple_alerts_from_single_sample() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(95.0, 92.0, None, vec![partition("/data", "/dev/sdb1", "xfs", 97.0)]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert_eq!(eval.alerts.len(), 3);
        assert!(eval.alerts.iter().any(|a| a.key
            == AlertKey::Disk {
                mountpoint: "/data".into()
            }));
    }

    #[test]
    fn repeated_mountpoint_yields_one_alert_at_highest_value() {
        let mut cooldown = AlertCooldownTracker::default();
        let sample = make_sample(
            10.0,
            10.0,
            None,
            vec![
                partition("/data", "/dev/sdb1", "ext4", 95.0),
                partition("/data", "/dev/sdc1", "ext4", 96.0),
                partition("/data", "/dev/sdd1", "ext4", 91.0),
            ],
        );
        let now = Utc::now();

        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, now);
        assert_eq!(eval.alerts.len(), 1);
        assert_eq!(eval.alerts[0].current_value, 96.0);
        assert!(eval.suppressed.is_empty());

        cooldown.mark_sent(&table(), &eval.alerts[0].key, now);
        let again = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, now);
        assert!(again.alerts.is_empty());
        assert_eq!(again.suppressed.len(), 1);
    }

    #[test]
    fn pseudo_partitions_never_alert() {
        let cooldown = AlertCooldownTracker::default();
        let sample = make_sample(
            10.0,
            10.0,
            None,
            vec![
                partition("/snap/core/1", "/dev/loop0", "squashfs", 100.0),
                partition("/mnt/img", "/dev/loop3", "ext4", 100.0),
                partition("/run/user/1000", "/dev/sda2", "ext4", 100.0),
                partition("/sys/fs/cgroup", "cgroup", "cgroup2", 100.0),
                partition("/dev/shm", "shm", "tmpfs", 100.0),
                partition("/var/lib/docker/overlay2/x", "overlay", "overlay", 100.0),
            ],
        );
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert!(eval.alerts.is_empty());
    }

    #[test]
    fn mount_prefix_matches_whole_components() {
        assert!(!is_pseudo_partition(&partition("/srv/runner", "/dev/sda1", "ext4", 1.0)));
        assert!(!is_pseudo_partition(&partition("/running", "/dev/sda1", "ext4", 1.0)));
        assert!(is_pseudo_partition(&partition("/run", "/dev/sda1", "ext4", 1.0)));
    }

    #[test]
    fn partition_without_percent_is_skipped() {
        let cooldown = AlertCooldownTracker::default();
        let mut broken = partition("/", "/dev/sda1", "ext4", 99.0);
        broken.percent = None;
        let sample = make_sample(10.0, 10.0, None, vec![broken]);
        let eval = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, Utc::now());
        assert!(eval.alerts.is_empty());
    }

    #[test]
    fn cooldown_suppresses_until_window_elapses() {
        let mut cooldown = AlertCooldownTracker::new(Duration::from_secs(600));
        let sample = make_sample(95.0, 10.0, None, vec![]);
        let t0 = Utc::now();

        let first = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, t0);
        assert_eq!(first.alerts.len(), 1);
        for alert in &first.alerts {
            cooldown.mark_sent(&alert.table_name, &alert.key, t0);
        }

        let t1 = t0 + chrono::Duration::seconds(1);
        let second = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, t1);
        assert!(second.alerts.is_empty());
        assert_eq!(second.suppressed.len(), 1);

        let t2 = t0 + chrono::Duration::seconds(600);
        let third = evaluate_sample(&table(), &sample, &ThresholdConfig::default(), &cooldown, t2);
        assert_eq!(third.alerts.len(), 1);
    }

    #[test]
    fn cooldown_is_per_machine_and_key() {
        let mut cooldown = AlertCooldownTracker::default();
        let now = Utc::now();
        let cpu = AlertKey::Metric { name: METRIC_CPU };
        cooldown.mark_sent(&table(), &cpu, now);

        assert!(!cooldown.is_allowed(&table(), &cpu, now));
        assert!(cooldown.is_allowed(&table(), &AlertKey::Metric { name: METRIC_RAM }, now));
        assert!(cooldown.is_allowed(&TableName::derive("beta", "lab1"), &cpu, now));
    }
}
