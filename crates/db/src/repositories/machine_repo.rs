//! Repository for the `machine_registry` table.

use fleetwatch_core::identifier::TableName;
use fleetwatch_core::machine::{MachineStatus, MachineUpsert};
use sqlx::PgPool;

use crate::models::machine::MachineRow;

/// Column list for `machine_registry` queries.
///
/// `registered_at` and `status` are nullable in registries created by
/// earlier deployments.
const COLUMNS: &str = "\
    id, system_name, location, table_name, os_type, hostname, public_ip, \
    COALESCE(registered_at, NOW()) AS registered_at, last_seen, \
    COALESCE(status, 'offline') AS status";

/// Provides query operations for the machine registry.
pub struct MachineRepo;

impl MachineRepo {
    /// Insert a registry entry or refresh an existing one in one statement.
    ///
    /// On conflict: `os_type`, `hostname` and `last_seen` are only replaced
    /// when provided, and `public_ip` always reflects the latest report. The
    /// machine is marked online only when `last_seen` advances; a bare
    /// re-registration keeps the status the monitor last persisted.
    pub async fn upsert(pool: &PgPool, entry: &MachineUpsert) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO machine_registry \
                (system_name, location, table_name, os_type, hostname, public_ip, last_seen, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'online') \
             ON CONFLICT (table_name) DO UPDATE SET \
                os_type = COALESCE(EXCLUDED.os_type, machine_registry.os_type), \
                hostname = COALESCE(EXCLUDED.hostname, machine_registry.hostname), \
                public_ip = EXCLUDED.public_ip, \
                last_seen = COALESCE(EXCLUDED.last_seen, machine_registry.last_seen), \
                status = CASE WHEN EXCLUDED.last_seen IS NULL \
                    THEN machine_registry.status ELSE 'online' END",
        )
        .bind(&entry.system_name)
        .bind(&entry.location)
        .bind(entry.table_name.as_str())
        .bind(&entry.os_type)
        .bind(&entry.hostname)
        .bind(&entry.public_ip)
        .bind(entry.last_seen)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List every registry entry ordered by `system_name`.
    pub async fn list(pool: &PgPool) -> Result<Vec<MachineRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM machine_registry ORDER BY system_name, id");
        sqlx::query_as::<_, MachineRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Find a registry entry by its derived table name.
    pub async fn find_by_table_name(
        pool: &PgPool,
        table: &TableName,
    ) -> Result<Option<MachineRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM machine_registry WHERE table_name = $1");
        sqlx::query_as::<_, MachineRow>(&query)
            .bind(table.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Persist a liveness status. Returns `true` if a row was updated.
    pub async fn set_status(
        pool: &PgPool,
        table: &TableName,
        status: MachineStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE machine_registry SET status = $1 WHERE table_name = $2")
            .bind(status.as_str())
            .bind(table.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
