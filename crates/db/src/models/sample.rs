//! Per-machine sample rows.
//!
//! Every column is read as nullable: relations provisioned by earlier
//! deployments carry no NOT NULL constraints. Missing scalars read as zero,
//! missing lists as empty.

use fleetwatch_core::telemetry::{
    DiskIo, DiskPartition, GpuInfo, HistoryPoint, MetricSample, NewSample, TopProcess,
    DEFAULT_AGENT_STATUS,
};
use fleetwatch_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A full row of a machine's sample relation.
#[derive(Debug, Clone, FromRow)]
pub struct SampleRow {
    pub id: DbId,
    pub ts: Timestamp,
    pub cpu_percent: Option<f64>,
    pub cpu_per_core: Option<Json<Option<Vec<f64>>>>,
    pub cpu_freq_mhz: Option<f64>,
    pub cpu_temp: Option<f64>,
    pub ram_total_gb: Option<f64>,
    pub ram_used_gb: Option<f64>,
    pub ram_percent: Option<f64>,
    pub swap_total_gb: Option<f64>,
    pub swap_used_gb: Option<f64>,
    pub swap_percent: Option<f64>,
    pub gpu_info: Option<Json<Option<Vec<GpuInfo>>>>,
    pub disk_partitions: Option<Json<Option<Vec<DiskPartition>>>>,
    pub disk_io: Option<Json<Option<DiskIo>>>,
    pub net_bytes_sent: Option<f64>,
    pub net_bytes_recv: Option<f64>,
    pub net_packets_sent: Option<f64>,
    pub net_packets_recv: Option<f64>,
    pub public_ip: Option<String>,
    pub top_processes: Option<Json<Option<Vec<TopProcess>>>>,
    pub uptime_seconds: Option<f64>,
    pub boot_time: Option<String>,
    pub os_version: Option<String>,
    pub hostname: Option<String>,
    pub status: Option<String>,
}

/// Unwrap a nullable JSONB column that may also hold a JSON `null`.
fn json_opt<T>(value: Option<Json<Option<T>>>) -> Option<T> {
    value.and_then(|Json(inner)| inner)
}

impl From<SampleRow> for MetricSample {
    fn from(row: SampleRow) -> Self {
        MetricSample {
            id: row.id,
            data: NewSample {
                ts: row.ts,
                cpu_percent: row.cpu_percent.unwrap_or_default(),
                cpu_per_core: json_opt(row.cpu_per_core).unwrap_or_default(),
                cpu_freq_mhz: row.cpu_freq_mhz.unwrap_or_default(),
                cpu_temp: row.cpu_temp,
                ram_total_gb: row.ram_total_gb.unwrap_or_default(),
                ram_used_gb: row.ram_used_gb.unwrap_or_default(),
                ram_percent: row.ram_percent.unwrap_or_default(),
                swap_total_gb: row.swap_total_gb.unwrap_or_default(),
                swap_used_gb: row.swap_used_gb.unwrap_or_default(),
                swap_percent: row.swap_percent.unwrap_or_default(),
                gpu_info: json_opt(row.gpu_info),
                disk_partitions: json_opt(row.disk_partitions).unwrap_or_default(),
                disk_io: json_opt(row.disk_io),
                net_bytes_sent: row.net_bytes_sent.unwrap_or_default(),
                net_bytes_recv: row.net_bytes_recv.unwrap_or_default(),
                net_packets_sent: row.net_packets_sent.unwrap_or_default(),
                net_packets_recv: row.net_packets_recv.unwrap_or_default(),
                public_ip: row.public_ip,
                top_processes: json_opt(row.top_processes).unwrap_or_default(),
                uptime_seconds: row.uptime_seconds.unwrap_or_default(),
                boot_time: row.boot_time.unwrap_or_default(),
                os_version: row.os_version.unwrap_or_default(),
                hostname: row.hostname.unwrap_or_default(),
                status: row
                    .status
                    .unwrap_or_else(|| DEFAULT_AGENT_STATUS.to_string()),
            },
        }
    }
}

/// Projection returned by the history query.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub ts: Timestamp,
    pub cpu_percent: Option<f64>,
    pub ram_percent: Option<f64>,
    pub net_bytes_sent: Option<f64>,
    pub net_bytes_recv: Option<f64>,
    pub status: Option<String>,
}

impl From<HistoryRow> for HistoryPoint {
    fn from(row: HistoryRow) -> Self {
        HistoryPoint {
            ts: row.ts,
            cpu_percent: row.cpu_percent.unwrap_or_default(),
            ram_percent: row.ram_percent.unwrap_or_default(),
            net_bytes_sent: row.net_bytes_sent.unwrap_or_default(),
            net_bytes_recv: row.net_bytes_recv.unwrap_or_default(),
            status: row
                .status
                .unwrap_or_else(|| DEFAULT_AGENT_STATUS.to_string()),
        }
    }
}
