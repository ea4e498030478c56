//! Repository for the per-machine sample relations (append-only time-series).
//!
//! Relation names are spliced into the SQL text; [`TableName`] guarantees
//! they are lowercase `[a-z0-9_]` only.

use fleetwatch_core::identifier::TableName;
use fleetwatch_core::telemetry::NewSample;
use fleetwatch_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::sample::{HistoryRow, SampleRow};

/// Column list for sample SELECT queries (includes `id`).
const COLUMNS: &str = "\
    id, ts, cpu_percent, cpu_per_core, cpu_freq_mhz, cpu_temp, \
    ram_total_gb, ram_used_gb, ram_percent, \
    swap_total_gb, swap_used_gb, swap_percent, \
    gpu_info, disk_partitions, disk_io, \
    net_bytes_sent, net_bytes_recv, net_packets_sent, net_packets_recv, \
    public_ip, top_processes, uptime_seconds, boot_time, os_version, hostname, status";

/// Column list for sample INSERT statements (excludes the surrogate `id`).
const INSERT_COLUMNS: &str = "\
    ts, cpu_percent, cpu_per_core, cpu_freq_mhz, cpu_temp, \
    ram_total_gb, ram_used_gb, ram_percent, \
    swap_total_gb, swap_used_gb, swap_percent, \
    gpu_info, disk_partitions, disk_io, \
    net_bytes_sent, net_bytes_recv, net_packets_sent, net_packets_recv, \
    public_ip, top_processes, uptime_seconds, boot_time, os_version, hostname, status";

/// Column list for history queries.
const HISTORY_COLUMNS: &str = "ts, cpu_percent, ram_percent, net_bytes_sent, net_bytes_recv, status";

/// Provides query operations for machine samples.
pub struct SampleRepo;

impl SampleRepo {
    /// Append one sample, returning its surrogate key.
    pub async fn insert(
        pool: &PgPool,
        table: &TableName,
        sample: &NewSample,
    ) -> Result<DbId, sqlx::Error> {
        let query = format!(
            "INSERT INTO {table} ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                     $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25) \
             RETURNING id"
        );
        sqlx::query_scalar::<_, DbId>(&query)
            .bind(sample.ts)
            .bind(sample.cpu_percent)
            .bind(Json(&sample.cpu_per_core))
            .bind(sample.cpu_freq_mhz)
            .bind(sample.cpu_temp)
            .bind(sample.ram_total_gb)
            .bind(sample.ram_used_gb)
            .bind(sample.ram_percent)
            .bind(sample.swap_total_gb)
            .bind(sample.swap_used_gb)
            .bind(sample.swap_percent)
            .bind(sample.gpu_info.as_ref().map(Json))
            .bind(Json(&sample.disk_partitions))
            .bind(sample.disk_io.as_ref().map(Json))
            .bind(sample.net_bytes_sent)
            .bind(sample.net_bytes_recv)
            .bind(sample.net_packets_sent)
            .bind(sample.net_packets_recv)
            .bind(&sample.public_ip)
            .bind(Json(&sample.top_processes))
            .bind(sample.uptime_seconds)
            .bind(&sample.boot_time)
            .bind(&sample.os_version)
            .bind(&sample.hostname)
            .bind(&sample.status)
            .fetch_one(pool)
            .await
    }

    /// Most recent sample by timestamp, ties broken by insertion order.
    pub async fn latest(pool: &PgPool, table: &TableName) -> Result<Option<SampleRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {table} ORDER BY ts DESC, id DESC LIMIT 1");
        sqlx::query_as::<_, SampleRow>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Samples newer than `since`, oldest first.
    pub async fn history(
        pool: &PgPool,
        table: &TableName,
        since: Timestamp,
    ) -> Result<Vec<HistoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {HISTORY_COLUMNS} FROM {table} WHERE ts > $1 ORDER BY ts ASC, id ASC"
        );
        sqlx::query_as::<_, HistoryRow>(&query)
            .bind(since)
            .fetch_all(pool)
            .await
    }
}
