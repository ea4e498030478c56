//! Ingestion handler: registration and sample persistence.
//!
//! Each call is independent and may run concurrently with any other; the
//! only shared resources are the store's connection pool and the one-shot
//! registry provisioning guard.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;

use crate::error::CoreError;
use crate::identifier::TableName;
use crate::machine::MachineUpsert;
use crate::store::{MachineStore, StoreError};
use crate::telemetry::{MetricsPayload, RegisterPayload};
use crate::types::{DbId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Payload rejected before any storage mutation.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<CoreError> for IngestError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => IngestError::Validation(msg),
            other => IngestError::Validation(other.to_string()),
        }
    }
}

/// Identifiers of an accepted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub table_name: TableName,
    pub sample_id: DbId,
}

/// Validates agent payloads and writes them through a [`MachineStore`].
pub struct IngestService {
    store: Arc<dyn MachineStore>,
    registry_ready: OnceCell<()>,
}

impl IngestService {
    pub fn new(store: Arc<dyn MachineStore>) -> Self {
        Self {
            store,
            registry_ready: OnceCell::new(),
        }
    }

    /// Provision the registry once per process. A failed attempt is retried
    /// by the next caller.
    async fn ensure_registry(&self) -> Result<(), StoreError> {
        self.registry_ready
            .get_or_try_init(|| async { self.store.ensure_registry().await })
            .await
            .map(|_| ())
    }

    /// Register (or re-register) a machine and provision its sample relation.
    ///
    /// A new machine starts online with no `last_seen`, so it only becomes a
    /// liveness subject after its first sample. Re-registering an existing
    /// machine leaves both `last_seen` and its persisted status untouched.
    pub async fn register(&self, payload: RegisterPayload) -> Result<TableName, IngestError> {
        payload.check()?;
        let table_name = TableName::derive(&payload.system_name, &payload.location);

        self.ensure_registry().await?;
        self.store.ensure_sample_table(&table_name).await?;
        self.store
            .upsert_machine(&MachineUpsert {
                system_name: payload.system_name,
                location: payload.location,
                table_name: table_name.clone(),
                os_type: Some(payload.os_type),
                hostname: Some(payload.hostname),
                public_ip: payload.public_ip,
                last_seen: None,
            })
            .await?;

        tracing::info!(table_name = %table_name, "Machine registered");
        Ok(table_name)
    }

    /// Persist one sample received now.
    pub async fn record_sample(&self, payload: MetricsPayload) -> Result<Ingested, IngestError> {
        self.record_sample_at(payload, Utc::now()).await
    }

    /// Persist one sample, stamping the registry's `last_seen` with
    /// `received_at`.
    ///
    /// The sample row is written before the registry is touched; if the
    /// registry update then fails the call fails and the agent retries.
    pub async fn record_sample_at(
        &self,
        payload: MetricsPayload,
        received_at: Timestamp,
    ) -> Result<Ingested, IngestError> {
        let table_name = TableName::derive(&payload.system_name, &payload.location);
        let system_name = payload.system_name.clone();
        let location = payload.location.clone();
        let hostname = payload.hostname.clone();
        let sample = payload.into_sample()?;

        self.ensure_registry().await?;
        self.store.ensure_sample_table(&table_name).await?;

        let sample_id = self.store.insert_sample(&table_name, &sample).await?;
        self.store
            .upsert_machine(&MachineUpsert {
                system_name,
                location,
                table_name: table_name.clone(),
                os_type: None,
                hostname: Some(hostname),
                public_ip: sample.public_ip.clone(),
                last_seen: Some(received_at),
            })
            .await?;

        tracing::debug!(table_name = %table_name, sample_id, "Sample recorded");
        Ok(Ingested {
            table_name,
            sample_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::machine::MachineStatus;
    use crate::memory::InMemoryStore;

    fn metrics(cpu: f64, timestamp: &str) -> MetricsPayload {
        serde_json::from_value(json!({
            "system_name": "alpha",
            "location": "lab1",
            "timestamp": timestamp,
            "cpu_percent": cpu,
            "cpu_per_core": [cpu],
            "cpu_freq_mhz": 3200.0,
            "ram_total_gb": 16.0,
            "ram_used_gb": 4.0,
            "ram_percent": 25.0,
            "swap_total_gb": 0.0,
            "swap_used_gb": 0.0,
            "swap_percent": 0.0,
            "disk_partitions": [],
            "net_bytes_sent": 1.0,
            "net_bytes_recv": 2.0,
            "net_packets_sent": 3.0,
            "net_packets_recv": 4.0,
            "public_ip": "203.0.113.7",
            "top_processes": [],
            "uptime_seconds": 100.0,
            "boot_time": "2024-05-01T00:00:00",
            "os_version": "6.1",
            "hostname": "alpha-host"
        }))
        .expect("valid payload")
    }

    fn register_payload() -> RegisterPayload {
        serde_json::from_value(json!({
            "system_name": "alpha",
            "location": "lab1",
            "os_type": "Linux",
            "hostname": "alpha-host"
        }))
        .expect("valid payload")
    }

    #[tokio::test]
    async fn register_provisions_without_last_seen() {
        let store = Arc::new(InMemoryStore::new());
        let service = IngestService::new(store.clone());

        let table = service.register(register_payload()).await.unwrap();
        assert_eq!(table.as_str(), "machine_alpha_lab1");
        assert!(store.registry_ready().await);
        assert!(store.has_sample_table(&table).await);

        let machine = store.machine(&table).await.unwrap();
        assert_eq!(machine.status, MachineStatus::Online);
        assert_eq!(machine.last_seen, None);
        assert_eq!(machine.os_type.as_deref(), Some("Linux"));
    }

    #[tokio::test]
    async fn reregistering_keeps_offline_status() {
        let store = Arc::new(InMemoryStore::new());
        let service = IngestService::new(store.clone());
        let received = Utc::now();

        let table = service
            .record_sample_at(metrics(5.0, "2024-05-01T12:00:00"), received)
            .await
            .unwrap()
            .table_name;
        store.set_status(&table, MachineStatus::Offline).await.unwrap();

        service.register(register_payload()).await.unwrap();

        let machine = store.machine(&table).await.unwrap();
        assert_eq!(machine.status, MachineStatus::Offline);
        assert_eq!(machine.last_seen, Some(received));
        assert_eq!(machine.os_type.as_deref(), Some("Linux"));
    }

    #[tokio::test]
    async fn record_sample_updates_registry_and_latest() {
        let store = Arc::new(InMemoryStore::new());
        let service = IngestService::new(store.clone());
        let received = Utc::now();

        let ingested = service
            .record_sample_at(metrics(42.0, "2024-05-01T12:00:00"), received)
            .await
            .unwrap();

        let machine = store.machine(&ingested.table_name).await.unwrap();
        assert_eq!(machine.last_seen, Some(received));
        assert_eq!(machine.status, MachineStatus::Online);
        assert_eq!(machine.public_ip.as_deref(), Some("203.0.113.7"));

        let latest = store.latest_sample(&ingested.table_name).await.unwrap().unwrap();
        assert_eq!(latest.id, ingested.sample_id);
        assert_eq!(latest.data.cpu_percent, 42.0);
    }

    #[tokio::test]
    async fn latest_breaks_timestamp_ties_by_insertion_order() {
        let store = Arc::new(InMemoryStore::new());
        let service = IngestService::new(store.clone());

        service.record_sample(metrics(10.0, "2024-05-01T12:00:05")).await.unwrap();
        service.record_sample(metrics(20.0, "2024-05-01T12:00:00")).await.unwrap();
        let tie = service.record_sample(metrics(30.0, "2024-05-01T12:00:05")).await.unwrap();

        let latest = store.latest_sample(&tie.table_name).await.unwrap().unwrap();
        assert_eq!(latest.id, tie.sample_id);
        assert_eq!(latest.data.cpu_percent, 30.0);
    }

    #[tokio::test]
    async fn invalid_payload_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let service = IngestService::new(store.clone());

        let result = service.record_sample(metrics(-5.0, "2024-05-01T12:00:00")).await;
        assert_matches!(result, Err(IngestError::Validation(_)));
        assert_eq!(store.sample_table_count().await, 0);
        assert!(store.list_machines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_surfaces_to_caller() {
        let store = Arc::new(InMemoryStore::new());
        store.set_unavailable(true);
        let service = IngestService::new(store.clone());

        let result = service.record_sample(metrics(5.0, "2024-05-01T12:00:00")).await;
        assert_matches!(result, Err(IngestError::Storage(StoreError::Unavailable(_))));

        // The registry guard is not poisoned by a failed attempt.
        store.set_unavailable(false);
        assert!(service.record_sample(metrics(5.0, "2024-05-01T12:00:00")).await.is_ok());
    }
}
