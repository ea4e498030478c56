//! Machine registry rows.

use fleetwatch_core::identifier::TableName;
use fleetwatch_core::machine::{Machine, MachineStatus};
use fleetwatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row of `machine_registry`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MachineRow {
    pub id: DbId,
    pub system_name: String,
    pub location: String,
    pub table_name: String,
    pub os_type: Option<String>,
    pub hostname: Option<String>,
    pub public_ip: Option<String>,
    pub registered_at: Timestamp,
    pub last_seen: Option<Timestamp>,
    pub status: String,
}

impl MachineRow {
    /// Convert into the domain type.
    ///
    /// Returns `None` when the stored `table_name` is not a usable
    /// identifier. An unrecognized status reads as offline.
    pub fn into_machine(self) -> Option<Machine> {
        let table_name = TableName::sanitize(&self.table_name)?;
        if table_name.as_str() != self.table_name {
            return None;
        }
        let status = self.status.parse().unwrap_or(MachineStatus::Offline);
        Some(Machine {
            system_name: self.system_name,
            location: self.location,
            table_name,
            os_type: self.os_type,
            hostname: self.hostname,
            public_ip: self.public_ip,
            registered_at: self.registered_at,
            last_seen: self.last_seen,
            status,
        })
    }
}
