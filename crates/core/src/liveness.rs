//! Liveness state machine (pure, no storage access).
//!
//! A machine is online while its last sample is at most `offline_after` old.
//! [`LivenessTracker`] remembers the last status observed per machine so the
//! monitor can detect edges without re-reading history. The first
//! observation of a machine is seeded from the registry's persisted status.

use std::collections::HashMap;
use std::time::Duration;

use crate::identifier::TableName;
use crate::machine::MachineStatus;
use crate::types::Timestamp;

/// Classify a machine from the age of its last sample.
///
/// Strictly greater than `offline_after` means offline; a sample exactly
/// `offline_after` old still counts as online. A `last_seen` in the future
/// (agent clock skew) counts as online.
pub fn classify(last_seen: Timestamp, now: Timestamp, offline_after: Duration) -> MachineStatus {
    let elapsed = now.signed_duration_since(last_seen);
    let limit = chrono::Duration::from_std(offline_after).unwrap_or(chrono::Duration::MAX);
    if elapsed > limit {
        MachineStatus::Offline
    } else {
        MachineStatus::Online
    }
}

/// Direction of a liveness edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOffline,
    CameOnline,
}

/// Result of comparing the current classification with the remembered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub previous: MachineStatus,
    pub current: MachineStatus,
    /// `previous` came from the persisted registry status rather than from
    /// an earlier observation in this process.
    pub seeded: bool,
    pub transition: Option<Transition>,
}

/// Process-local `table_name -> last observed status` map.
///
/// Owned by one monitor instance; not shared.
#[derive(Debug, Default)]
pub struct LivenessTracker {
    states: HashMap<TableName, MachineStatus>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` against the remembered status without recording it.
    ///
    /// The caller persists any transition first and then calls
    /// [`record`](Self::record), so a failed write is retried next cycle.
    pub fn observe(
        &self,
        table: &TableName,
        persisted: MachineStatus,
        current: MachineStatus,
    ) -> Observation {
        let (previous, seeded) = match self.states.get(table) {
            Some(status) => (*status, false),
            None => (persisted, true),
        };

        let transition = match (previous, current) {
            (MachineStatus::Online, MachineStatus::Offline) => Some(Transition::WentOffline),
            (MachineStatus::Offline, MachineStatus::Online) => Some(Transition::CameOnline),
            _ => None,
        };

        Observation {
            previous,
            current,
            seeded,
            transition,
        }
    }

    pub fn record(&mut self, table: &TableName, status: MachineStatus) {
        self.states.insert(table.clone(), status);
    }

    pub fn get(&self, table: &TableName) -> Option<MachineStatus> {
        self.states.get(table).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    const OFFLINE_AFTER: Duration = Duration::from_secs(60);

    fn table() -> TableName {
        TableName::derive("alpha", "lab1")
    }

    #[test]
    fn classify_respects_strict_boundary() {
        let now = Utc::now();
        let at_limit = now - chrono::Duration::seconds(60);
        let past_limit = now - chrono::Duration::seconds(61);
        assert_eq!(classify(at_limit, now, OFFLINE_AFTER), MachineStatus::Online);
        assert_eq!(classify(past_limit, now, OFFLINE_AFTER), MachineStatus::Offline);
    }

    #[test]
    fn classify_future_last_seen_is_online() {
        let now = Utc::now();
        let ahead = now + chrono::Duration::seconds(30);
        assert_eq!(classify(ahead, now, OFFLINE_AFTER), MachineStatus::Online);
    }

    #[test]
    fn first_observation_seeds_from_persisted_status() {
        let tracker = LivenessTracker::new();
        let obs = tracker.observe(&table(), MachineStatus::Offline, MachineStatus::Offline);
        assert!(obs.seeded);
        assert_eq!(obs.previous, MachineStatus::Offline);
        assert_eq!(obs.transition, None);
    }

    #[test]
    fn online_to_offline_is_an_edge_once() {
        let mut tracker = LivenessTracker::new();
        tracker.record(&table(), MachineStatus::Online);

        let obs = tracker.observe(&table(), MachineStatus::Online, MachineStatus::Offline);
        assert!(!obs.seeded);
        assert_eq!(obs.transition, Some(Transition::WentOffline));
        tracker.record(&table(), obs.current);

        // Persisted status is ignored once the machine is tracked.
        let again = tracker.observe(&table(), MachineStatus::Online, MachineStatus::Offline);
        assert_eq!(again.transition, None);
    }

    #[test]
    fn offline_to_online_is_a_recovery_edge() {
        let mut tracker = LivenessTracker::new();
        tracker.record(&table(), MachineStatus::Offline);
        let obs = tracker.observe(&table(), MachineStatus::Online, MachineStatus::Online);
        assert_eq!(obs.transition, Some(Transition::CameOnline));
    }

    #[test]
    fn unrecorded_observation_repeats_the_edge() {
        let mut tracker = LivenessTracker::new();
        tracker.record(&table(), MachineStatus::Online);
        let first = tracker.observe(&table(), MachineStatus::Online, MachineStatus::Offline);
        let second = tracker.observe(&table(), MachineStatus::Online, MachineStatus::Offline);
        assert_eq!(first.transition, second.transition);
        assert_eq!(tracker.get(&table()), Some(MachineStatus::Online));
    }
}
