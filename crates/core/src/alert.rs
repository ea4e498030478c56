//! Threshold alert types.

use serde::Serialize;

use crate::identifier::TableName;
use crate::types::Timestamp;

/// Severity level for a metric threshold violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Value reached the configured threshold.
    Warning,
    /// Value reached the threshold plus [`crate::thresholds::CRITICAL_MARGIN`].
    Critical,
}

/// Cooldown identity of a threshold alert within one machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AlertKey {
    /// A scalar metric (see [`crate::metric_names`]).
    Metric { name: &'static str },
    /// Usage of one mounted partition.
    Disk { mountpoint: String },
}

/// A single threshold violation on one machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricAlert {
    pub table_name: TableName,
    pub key: AlertKey,
    /// The observed value that triggered the alert.
    pub current_value: f64,
    /// The configured threshold that was reached.
    pub threshold_value: f64,
    pub level: AlertLevel,
    /// Capture time of the evaluated sample.
    pub timestamp: Timestamp,
}

impl MetricAlert {
    /// Human-readable metric label, e.g. `cpu_percent` or `disk /var`.
    pub fn metric_label(&self) -> String {
        match &self.key {
            AlertKey::Metric { name } => (*name).to_string(),
            AlertKey::Disk { mountpoint } => format!("disk {mountpoint}"),
        }
    }
}
