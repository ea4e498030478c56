//! Canonical metric names used in alert keys, alert payloads and
//! notification subjects.

/// Overall CPU utilization percentage (`cpu_percent`).
pub const METRIC_CPU: &str = "cpu_percent";

/// RAM utilization percentage (`ram_percent`).
pub const METRIC_RAM: &str = "ram_percent";

/// CPU package temperature in degrees Celsius (`cpu_temp`).
pub const METRIC_TEMPERATURE: &str = "cpu_temp";

/// Per-partition disk usage percentage.
pub const METRIC_DISK: &str = "disk";
