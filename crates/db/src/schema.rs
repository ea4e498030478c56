//! Runtime schema provisioning.
//!
//! The registry and every per-machine sample relation are created on demand
//! rather than by migrations, because the set of machines is open-ended.
//! DDL for one relation runs inside a transaction holding an advisory lock
//! keyed on the relation name, so concurrent ingestion calls for the same
//! machine serialize on creation instead of racing on the catalog.

use fleetwatch_core::identifier::TableName;
use sqlx::PgPool;

/// Name of the registry relation.
pub const REGISTRY_TABLE: &str = "machine_registry";

const REGISTRY_DDL: &str = "\
    CREATE TABLE IF NOT EXISTS machine_registry ( \
        id BIGSERIAL PRIMARY KEY, \
        system_name TEXT NOT NULL, \
        location TEXT NOT NULL, \
        table_name TEXT NOT NULL UNIQUE, \
        os_type TEXT, \
        hostname TEXT, \
        public_ip TEXT, \
        registered_at TIMESTAMPTZ DEFAULT NOW(), \
        last_seen TIMESTAMPTZ, \
        status TEXT DEFAULT 'offline' \
    )";

/// DDL for one machine's sample relation.
///
/// Scalar columns stay nullable so relations created by earlier deployments
/// remain readable; nested structures are stored as JSONB.
fn sample_table_ddl(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ( \
            id BIGSERIAL PRIMARY KEY, \
            ts TIMESTAMPTZ NOT NULL DEFAULT NOW(), \
            cpu_percent DOUBLE PRECISION, cpu_per_core JSONB, \
            cpu_freq_mhz DOUBLE PRECISION, cpu_temp DOUBLE PRECISION, \
            ram_total_gb DOUBLE PRECISION, ram_used_gb DOUBLE PRECISION, \
            ram_percent DOUBLE PRECISION, \
            swap_total_gb DOUBLE PRECISION, swap_used_gb DOUBLE PRECISION, \
            swap_percent DOUBLE PRECISION, \
            gpu_info JSONB, disk_partitions JSONB, disk_io JSONB, \
            net_bytes_sent DOUBLE PRECISION, net_bytes_recv DOUBLE PRECISION, \
            net_packets_sent DOUBLE PRECISION, net_packets_recv DOUBLE PRECISION, \
            public_ip TEXT, top_processes JSONB, uptime_seconds DOUBLE PRECISION, \
            boot_time TEXT, os_version TEXT, hostname TEXT, status TEXT \
        )"
    )
}

fn sample_index_ddl(table: &TableName) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {index} ON {table} (ts DESC)",
        index = table.ts_index_name()
    )
}

/// Create the registry relation if absent.
pub async fn ensure_registry(pool: &PgPool) -> Result<(), sqlx::Error> {
    run_locked(pool, REGISTRY_TABLE, &[REGISTRY_DDL.to_string()]).await
}

/// Create the sample relation for `table` and its timestamp index if absent.
pub async fn ensure_sample_table(pool: &PgPool, table: &TableName) -> Result<(), sqlx::Error> {
    run_locked(
        pool,
        table.as_str(),
        &[sample_table_ddl(table), sample_index_ddl(table)],
    )
    .await
}

/// Run `statements` in one transaction under an advisory lock on `lock_key`.
async fn run_locked(pool: &PgPool, lock_key: &str, statements: &[String]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(lock_key)
        .execute(&mut *tx)
        .await?;
    for statement in statements {
        sqlx::query(statement.as_str()).execute(&mut *tx).await?;
    }
    tx.commit().await
}
