use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use fleetwatch_core::identifier::TableName;
use fleetwatch_core::machine::{Machine, MachineStatus, MachineUpsert};
use fleetwatch_core::memory::InMemoryStore;
use fleetwatch_core::store::{MachineStore, StoreError};
use fleetwatch_core::telemetry::{HistoryPoint, MetricSample, NewSample};
use fleetwatch_core::thresholds::ThresholdConfig;
use fleetwatch_core::types::{DbId, Timestamp};
use fleetwatch_events::LogNotifier;
use fleetwatch_monitor::{Monitor, MonitorScheduler};

/// Holds the registry read open until released.
#[derive(Default)]
struct GatedStore {
    inner: InMemoryStore,
    entered: Notify,
    release: Notify,
    finished: AtomicBool,
}

#[async_trait]
impl MachineStore for GatedStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn ensure_registry(&self) -> Result<(), StoreError> {
        self.inner.ensure_registry().await
    }

    async fn ensure_sample_table(&self, table: &TableName) -> Result<(), StoreError> {
        self.inner.ensure_sample_table(table).await
    }

    async fn upsert_machine(&self, entry: &MachineUpsert) -> Result<(), StoreError> {
        self.inner.upsert_machine(entry).await
    }

    async fn insert_sample(&self, table: &TableName, sample: &NewSample) -> Result<DbId, StoreError> {
        self.inner.insert_sample(table, sample).await
    }

    async fn list_machines(&self) -> Result<Vec<Machine>, StoreError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.finished.store(true, Ordering::SeqCst);
        self.inner.list_machines().await
    }

    async fn set_status(&self, table: &TableName, status: MachineStatus) -> Result<(), StoreError> {
        self.inner.set_status(table, status).await
    }

    async fn latest_sample(&self, table: &TableName) -> Result<Option<MetricSample>, StoreError> {
        self.inner.latest_sample(table).await
    }

    async fn history(&self, table: &TableName, since: Timestamp) -> Result<Vec<HistoryPoint>, StoreError> {
        self.inner.history(table, since).await
    }
}

#[tokio::test]
async fn cancellation_waits_for_running_cycle() {
    let store = Arc::new(GatedStore::default());
    let monitor = Monitor::new(
        store.clone(),
        Arc::new(LogNotifier),
        Duration::from_secs(60),
        ThresholdConfig::default(),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        MonitorScheduler::new(monitor, Duration::from_secs(3600)).run(cancel.clone()),
    );

    store.entered.notified().await;
    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    store.release.notify_one();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler stops once the cycle completes")
        .unwrap();
    assert!(store.finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn idle_scheduler_stops_on_cancel() {
    let store = Arc::new(InMemoryStore::new());
    let monitor = Monitor::new(
        store,
        Arc::new(LogNotifier),
        Duration::from_secs(60),
        ThresholdConfig::default(),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        MonitorScheduler::new(monitor, Duration::from_secs(3600)).run(cancel.clone()),
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("idle scheduler stops promptly")
        .unwrap();
}
