//! In-memory [`MachineStore`] used by tests and local runs without Postgres.
//!
//! Mirrors the Postgres semantics that callers rely on: upsert rules, sample
//! ordering by `(ts, id)` and a missing-relation error for unprovisioned
//! tables. Failures can be injected to exercise error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::identifier::TableName;
use crate::machine::{Machine, MachineStatus, MachineUpsert};
use crate::store::{MachineStore, StoreError};
use crate::telemetry::{HistoryPoint, MetricSample, NewSample};
use crate::types::{DbId, Timestamp};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct InjectedFailure(&'static str);

#[derive(Debug, Default)]
struct State {
    registry_ready: bool,
    machines: BTreeMap<TableName, Machine>,
    samples: BTreeMap<TableName, Vec<MetricSample>>,
    next_id: DbId,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
    failing_tables: Mutex<HashSet<TableName>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make sample reads for `table` fail with [`StoreError::Backend`].
    pub fn fail_sample_reads(&self, table: &TableName, fail: bool) {
        let mut failing = self
            .failing_tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fail {
            failing.insert(table.clone());
        } else {
            failing.remove(table);
        }
    }

    pub async fn machine(&self, table: &TableName) -> Option<Machine> {
        self.state.read().await.machines.get(table).cloned()
    }

    pub async fn registry_ready(&self) -> bool {
        self.state.read().await.registry_ready
    }

    pub async fn has_sample_table(&self, table: &TableName) -> bool {
        self.state.read().await.samples.contains_key(table)
    }

    pub async fn sample_table_count(&self) -> usize {
        self.state.read().await.samples.len()
    }

    pub async fn sample_count(&self, table: &TableName) -> usize {
        self.state
            .read()
            .await
            .samples
            .get(table)
            .map_or(0, Vec::len)
    }

    /// Overwrite `last_seen` directly, bypassing ingestion.
    pub async fn set_last_seen(&self, table: &TableName, last_seen: Option<Timestamp>) {
        if let Some(machine) = self.state.write().await.machines.get_mut(table) {
            machine.last_seen = last_seen;
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(InjectedFailure(
                "store marked unavailable",
            )));
        }
        Ok(())
    }

    fn check_sample_reads(&self, table: &TableName) -> Result<(), StoreError> {
        let failing = self
            .failing_tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if failing.contains(table) {
            return Err(StoreError::backend(InjectedFailure("sample read failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl MachineStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn ensure_registry(&self) -> Result<(), StoreError> {
        self.check_available()?;
        self.state.write().await.registry_ready = true;
        Ok(())
    }

    async fn ensure_sample_table(&self, table: &TableName) -> Result<(), StoreError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .samples
            .entry(table.clone())
            .or_default();
        Ok(())
    }

    async fn upsert_machine(&self, entry: &MachineUpsert) -> Result<(), StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.machines.get_mut(&entry.table_name) {
            Some(machine) => {
                if entry.os_type.is_some() {
                    machine.os_type = entry.os_type.clone();
                }
                if entry.hostname.is_some() {
                    machine.hostname = entry.hostname.clone();
                }
                machine.public_ip = entry.public_ip.clone();
                if entry.last_seen.is_some() {
                    machine.last_seen = entry.last_seen;
                    machine.status = MachineStatus::Online;
                }
            }
            None => {
                state.machines.insert(
                    entry.table_name.clone(),
                    Machine {
                        system_name: entry.system_name.clone(),
                        location: entry.location.clone(),
                        table_name: entry.table_name.clone(),
                        os_type: entry.os_type.clone(),
                        hostname: entry.hostname.clone(),
                        public_ip: entry.public_ip.clone(),
                        registered_at: Utc::now(),
                        last_seen: entry.last_seen,
                        status: MachineStatus::Online,
                    },
                );
            }
        }
        Ok(())
    }

    async fn insert_sample(
        &self,
        table: &TableName,
        sample: &NewSample,
    ) -> Result<DbId, StoreError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;
        let rows = state
            .samples
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingRelation(table.clone()))?;
        rows.push(MetricSample {
            id,
            data: sample.clone(),
        });
        Ok(id)
    }

    async fn list_machines(&self) -> Result<Vec<Machine>, StoreError> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut machines: Vec<Machine> = state.machines.values().cloned().collect();
        machines.sort_by(|a, b| a.system_name.cmp(&b.system_name));
        Ok(machines)
    }

    async fn set_status(&self, table: &TableName, status: MachineStatus) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(machine) = self.state.write().await.machines.get_mut(table) {
            machine.status = status;
        }
        Ok(())
    }

    async fn latest_sample(&self, table: &TableName) -> Result<Option<MetricSample>, StoreError> {
        self.check_available()?;
        self.check_sample_reads(table)?;
        let state = self.state.read().await;
        let rows = state
            .samples
            .get(table)
            .ok_or_else(|| StoreError::MissingRelation(table.clone()))?;
        Ok(rows
            .iter()
            .max_by(|a, b| a.data.ts.cmp(&b.data.ts).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn history(
        &self,
        table: &TableName,
        since: Timestamp,
    ) -> Result<Vec<HistoryPoint>, StoreError> {
        self.check_available()?;
        self.check_sample_reads(table)?;
        let state = self.state.read().await;
        let rows = state
            .samples
            .get(table)
            .ok_or_else(|| StoreError::MissingRelation(table.clone()))?;
        let mut window: Vec<&MetricSample> = rows.iter().filter(|s| s.data.ts > since).collect();
        window.sort_by(|a, b| a.data.ts.cmp(&b.data.ts).then(a.id.cmp(&b.id)));
        Ok(window.into_iter().map(HistoryPoint::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn upsert(table: &TableName, last_seen: Option<Timestamp>) -> MachineUpsert {
        MachineUpsert {
            system_name: "alpha".into(),
            location: "lab1".into(),
            table_name: table.clone(),
            os_type: None,
            hostname: Some("alpha-host".into()),
            public_ip: None,
            last_seen,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_last_seen_when_absent() {
        let store = InMemoryStore::new();
        let table = TableName::derive("alpha", "lab1");
        let seen = Utc::now();

        store.upsert_machine(&upsert(&table, Some(seen))).await.unwrap();
        store.set_status(&table, MachineStatus::Offline).await.unwrap();
        store.upsert_machine(&upsert(&table, None)).await.unwrap();

        let machine = store.machine(&table).await.unwrap();
        assert_eq!(machine.last_seen, Some(seen));
        assert_eq!(machine.status, MachineStatus::Online);
    }

    #[tokio::test]
    async fn reading_unprovisioned_relation_fails() {
        let store = InMemoryStore::new();
        let table = TableName::derive("ghost", "nowhere");
        let result = store.latest_sample(&table).await;
        assert_matches!(result, Err(StoreError::MissingRelation(t)) if t == table);
    }

    #[tokio::test]
    async fn ensure_sample_table_is_idempotent() {
        let store = InMemoryStore::new();
        let table = TableName::derive("alpha", "lab1");
        store.ensure_sample_table(&table).await.unwrap();
        store.ensure_sample_table(&table).await.unwrap();
        assert_eq!(store.sample_table_count().await, 1);
    }
}
