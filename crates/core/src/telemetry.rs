//! Agent telemetry payloads and the typed sample records decoded from them.
//!
//! Agents post one [`MetricsPayload`] per reporting interval. Top-level
//! scalars and lists are required and enforced by serde; nested records
//! (GPU entries, disk partitions, disk I/O, processes) are decoded leniently
//! so a single odd field never rejects a whole sample. A nested value that is
//! missing or has the wrong type decodes as `None`, and unknown keys are kept
//! in `extra` so the stored JSON stays close to what the agent sent.

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Default status label when the agent omits one.
pub const DEFAULT_AGENT_STATUS: &str = "online";

// ---------------------------------------------------------------------------
// Lenient field decoders
// ---------------------------------------------------------------------------

/// Decode a number that may arrive as a JSON number, a numeric string, or
/// garbage. Garbage becomes `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

// ---------------------------------------------------------------------------
// Nested records
// ---------------------------------------------------------------------------

/// One GPU as reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub gpu_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mem_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temp_c: Option<f64>,
    /// Vendor/driver family (`nvidia`, `amd`, `intel`, ...).
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One mounted filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskPartition {
    #[serde(default, deserialize_with = "lenient_string")]
    pub mountpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub device: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fstype: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_gb: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub used_gb: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub free_gb: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percent: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Cumulative disk I/O counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskIo {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub read_mb: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub write_mb: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of the agent's top-processes list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopProcess {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub pid: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cpu_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mem_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Body of `POST /register`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterPayload {
    #[validate(length(max = 255))]
    pub system_name: String,
    #[validate(length(max = 255))]
    pub location: String,
    #[validate(length(max = 255))]
    pub os_type: String,
    #[validate(length(max = 255))]
    pub hostname: String,
    #[serde(default)]
    pub public_ip: Option<String>,
}

impl RegisterPayload {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// Body of `POST /metrics`: one telemetry snapshot from one agent.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MetricsPayload {
    #[validate(length(max = 255))]
    pub system_name: String,
    #[validate(length(max = 255))]
    pub location: String,
    /// ISO-8601 capture time; naive values are taken as UTC.
    #[validate(custom(function = "validate_timestamp"))]
    pub timestamp: String,

    #[validate(range(min = 0.0))]
    pub cpu_percent: f64,
    pub cpu_per_core: Vec<f64>,
    #[validate(range(min = 0.0))]
    pub cpu_freq_mhz: f64,
    #[serde(default)]
    pub cpu_temp: Option<f64>,

    #[validate(range(min = 0.0))]
    pub ram_total_gb: f64,
    #[validate(range(min = 0.0))]
    pub ram_used_gb: f64,
    #[validate(range(min = 0.0))]
    pub ram_percent: f64,
    #[validate(range(min = 0.0))]
    pub swap_total_gb: f64,
    #[validate(range(min = 0.0))]
    pub swap_used_gb: f64,
    #[validate(range(min = 0.0))]
    pub swap_percent: f64,

    #[serde(default)]
    pub gpu_info: Option<Vec<GpuInfo>>,
    pub disk_partitions: Vec<DiskPartition>,
    #[serde(default)]
    pub disk_io: Option<DiskIo>,

    pub net_bytes_sent: f64,
    pub net_bytes_recv: f64,
    pub net_packets_sent: f64,
    pub net_packets_recv: f64,
    #[serde(default)]
    pub public_ip: Option<String>,

    pub top_processes: Vec<TopProcess>,
    #[validate(range(min = 0.0))]
    pub uptime_seconds: f64,
    pub boot_time: String,
    pub os_version: String,
    #[validate(length(max = 255))]
    pub hostname: String,
    #[serde(default = "default_agent_status")]
    pub status: String,
}

fn default_agent_status() -> String {
    DEFAULT_AGENT_STATUS.to_string()
}

fn validate_timestamp(value: &str) -> Result<(), ValidationError> {
    parse_agent_timestamp(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("timestamp").with_message("not an ISO-8601 timestamp".into()))
}

/// Parse an agent timestamp.
///
/// Accepts RFC 3339 (`2024-05-01T12:00:00+02:00`, `...Z`) and naive ISO-8601
/// with or without fractional seconds, which is interpreted as UTC.
pub fn parse_agent_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    let raw = raw.trim();
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(CoreError::Validation(format!("invalid timestamp: {raw:?}")))
}

impl MetricsPayload {
    /// Validate the payload and convert it into an insertable sample.
    ///
    /// Nothing is written before this succeeds.
    pub fn into_sample(self) -> Result<NewSample, CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        let ts = parse_agent_timestamp(&self.timestamp)?;

        Ok(NewSample {
            ts,
            cpu_percent: self.cpu_percent,
            cpu_per_core: self.cpu_per_core,
            cpu_freq_mhz: self.cpu_freq_mhz,
            cpu_temp: self.cpu_temp,
            ram_total_gb: self.ram_total_gb,
            ram_used_gb: self.ram_used_gb,
            ram_percent: self.ram_percent,
            swap_total_gb: self.swap_total_gb,
            swap_used_gb: self.swap_used_gb,
            swap_percent: self.swap_percent,
            gpu_info: self.gpu_info,
            disk_partitions: self.disk_partitions,
            disk_io: self.disk_io,
            net_bytes_sent: self.net_bytes_sent,
            net_bytes_recv: self.net_bytes_recv,
            net_packets_sent: self.net_packets_sent,
            net_packets_recv: self.net_packets_recv,
            public_ip: self.public_ip,
            top_processes: self.top_processes,
            uptime_seconds: self.uptime_seconds,
            boot_time: self.boot_time,
            os_version: self.os_version,
            hostname: self.hostname,
            status: self.status,
        })
    }
}

// ---------------------------------------------------------------------------
// Stored samples
// ---------------------------------------------------------------------------

/// A validated sample ready to be appended to a machine's sample relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSample {
    pub ts: Timestamp,
    pub cpu_percent: f64,
    pub cpu_per_core: Vec<f64>,
    pub cpu_freq_mhz: f64,
    pub cpu_temp: Option<f64>,
    pub ram_total_gb: f64,
    pub ram_used_gb: f64,
    pub ram_percent: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub swap_percent: f64,
    pub gpu_info: Option<Vec<GpuInfo>>,
    pub disk_partitions: Vec<DiskPartition>,
    pub disk_io: Option<DiskIo>,
    pub net_bytes_sent: f64,
    pub net_bytes_recv: f64,
    pub net_packets_sent: f64,
    pub net_packets_recv: f64,
    pub public_ip: Option<String>,
    pub top_processes: Vec<TopProcess>,
    pub uptime_seconds: f64,
    pub boot_time: String,
    pub os_version: String,
    pub hostname: String,
    /// Status label as reported by the agent (not the registry liveness).
    pub status: String,
}

/// A sample read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    /// Surrogate key; breaks timestamp ties in insertion order.
    pub id: DbId,
    #[serde(flatten)]
    pub data: NewSample,
}

/// Narrow projection used by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub ts: Timestamp,
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub net_bytes_sent: f64,
    pub net_bytes_recv: f64,
    pub status: String,
}

impl From<&MetricSample> for HistoryPoint {
    fn from(sample: &MetricSample) -> Self {
        Self {
            ts: sample.data.ts,
            cpu_percent: sample.data.cpu_percent,
            ram_percent: sample.data.ram_percent,
            net_bytes_sent: sample.data.net_bytes_sent,
            net_bytes_recv: sample.data.net_bytes_recv,
            status: sample.data.status.clone(),
        }
    }
}
