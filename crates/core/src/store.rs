//! Storage seam shared by ingestion, the monitor and the read endpoints.
//!
//! All access to the registry and to the per-machine sample relations goes
//! through [`MachineStore`], parameterized by [`TableName`]. The Postgres
//! implementation lives in `fleetwatch-db`; [`crate::memory::InMemoryStore`]
//! backs tests.

use async_trait::async_trait;

use crate::identifier::TableName;
use crate::machine::{Machine, MachineStatus, MachineUpsert};
use crate::telemetry::{HistoryPoint, MetricSample, NewSample};
use crate::types::{DbId, Timestamp};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached at all (pool exhausted, connection
    /// refused, ...). Nothing else in the current unit of work can succeed.
    #[error("Storage unavailable: {0}")]
    Unavailable(#[source] BoxError),

    /// The per-machine sample relation has not been provisioned.
    #[error("Sample relation {0} does not exist")]
    MissingRelation(TableName),

    /// A statement failed; other relations may still be usable.
    #[error("Storage error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn unavailable(err: impl Into<BoxError>) -> Self {
        StoreError::Unavailable(err.into())
    }

    pub fn backend(err: impl Into<BoxError>) -> Self {
        StoreError::Backend(err.into())
    }

    /// Whether the failure affects the registry / connection pool as a
    /// whole rather than a single machine's relation.
    pub fn is_registry_level(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Storage access for the registry and the per-machine sample relations.
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Create the registry relation if absent. Idempotent.
    async fn ensure_registry(&self) -> Result<(), StoreError>;

    /// Create the sample relation for `table` and its descending timestamp
    /// index if absent. Idempotent and safe under concurrent callers.
    async fn ensure_sample_table(&self, table: &TableName) -> Result<(), StoreError>;

    /// Insert or refresh a registry entry (see [`MachineUpsert`]).
    async fn upsert_machine(&self, entry: &MachineUpsert) -> Result<(), StoreError>;

    /// Append a sample to `table`, returning its surrogate key.
    async fn insert_sample(&self, table: &TableName, sample: &NewSample)
        -> Result<DbId, StoreError>;

    /// All registry entries ordered by `system_name`.
    async fn list_machines(&self) -> Result<Vec<Machine>, StoreError>;

    /// Persist a liveness status.
    async fn set_status(&self, table: &TableName, status: MachineStatus)
        -> Result<(), StoreError>;

    /// Most recent sample by `(ts, id)`, if any.
    async fn latest_sample(&self, table: &TableName) -> Result<Option<MetricSample>, StoreError>;

    /// Samples newer than `since`, oldest first.
    async fn history(
        &self,
        table: &TableName,
        since: Timestamp,
    ) -> Result<Vec<HistoryPoint>, StoreError>;
}
