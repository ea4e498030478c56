//! [`MachineStore`] backed by a Postgres pool.

use async_trait::async_trait;
use fleetwatch_core::identifier::TableName;
use fleetwatch_core::machine::{Machine, MachineStatus, MachineUpsert};
use fleetwatch_core::store::{MachineStore, StoreError};
use fleetwatch_core::telemetry::{HistoryPoint, MetricSample, NewSample};
use fleetwatch_core::types::{DbId, Timestamp};

use crate::repositories::{MachineRepo, SampleRepo};
use crate::{schema, DbPool};

/// SQLSTATE for "relation does not exist".
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Clone)]
pub struct PgMachineStore {
    pool: DbPool,
}

impl PgMachineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error onto the storage error taxonomy.
///
/// Connection and pool failures affect every statement; anything else is
/// scoped to the statement that raised it.
pub fn classify_error(err: sqlx::Error, table: Option<&TableName>) -> StoreError {
    let connection_lost = matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed
    );
    if connection_lost {
        return StoreError::unavailable(err);
    }

    let undefined_table = matches!(
        &err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE)
    );
    match table {
        Some(table) if undefined_table => StoreError::MissingRelation(table.clone()),
        _ => StoreError::backend(err),
    }
}

#[async_trait]
impl MachineStore for PgMachineStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(|e| classify_error(e, None))
    }

    async fn ensure_registry(&self) -> Result<(), StoreError> {
        schema::ensure_registry(&self.pool)
            .await
            .map_err(|e| classify_error(e, None))
    }

    async fn ensure_sample_table(&self, table: &TableName) -> Result<(), StoreError> {
        schema::ensure_sample_table(&self.pool, table)
            .await
            .map_err(|e| classify_error(e, Some(table)))
    }

    async fn upsert_machine(&self, entry: &MachineUpsert) -> Result<(), StoreError> {
        MachineRepo::upsert(&self.pool, entry)
            .await
            .map_err(|e| classify_error(e, None))
    }

    async fn insert_sample(
        &self,
        table: &TableName,
        sample: &NewSample,
    ) -> Result<DbId, StoreError> {
        SampleRepo::insert(&self.pool, table, sample)
            .await
            .map_err(|e| classify_error(e, Some(table)))
    }

    async fn list_machines(&self) -> Result<Vec<Machine>, StoreError> {
        let rows = MachineRepo::list(&self.pool)
            .await
            .map_err(|e| classify_error(e, None))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let raw = row.table_name.clone();
                let machine = row.into_machine();
                if machine.is_none() {
                    tracing::warn!(table_name = %raw, "Skipping registry row with unusable table name");
                }
                machine
            })
            .collect())
    }

    async fn set_status(&self, table: &TableName, status: MachineStatus) -> Result<(), StoreError> {
        let updated = MachineRepo::set_status(&self.pool, table, status)
            .await
            .map_err(|e| classify_error(e, None))?;
        if !updated {
            tracing::warn!(table_name = %table, %status, "Status update matched no registry row");
        }
        Ok(())
    }

    async fn latest_sample(&self, table: &TableName) -> Result<Option<MetricSample>, StoreError> {
        let row = SampleRepo::latest(&self.pool, table)
            .await
            .map_err(|e| classify_error(e, Some(table)))?;
        Ok(row.map(MetricSample::from))
    }

    async fn history(
        &self,
        table: &TableName,
        since: Timestamp,
    ) -> Result<Vec<HistoryPoint>, StoreError> {
        let rows = SampleRepo::history(&self.pool, table, since)
            .await
            .map_err(|e| classify_error(e, Some(table)))?;
        Ok(rows.into_iter().map(HistoryPoint::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_registry_level() {
        let err = classify_error(sqlx::Error::PoolTimedOut, None);
        assert!(err.is_registry_level());
    }

    #[test]
    fn missing_row_is_statement_scoped() {
        let table = TableName::derive("alpha", "lab1");
        let err = classify_error(sqlx::Error::RowNotFound, Some(&table));
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(!err.is_registry_level());
    }
}
