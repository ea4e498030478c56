//! Machine registry entries and liveness status.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::identifier::TableName;
use crate::types::Timestamp;

/// Binary liveness classification of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    #[default]
    Offline,
}

impl MachineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MachineStatus::Online => "online",
            MachineStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(MachineStatus::Online),
            "offline" => Ok(MachineStatus::Offline),
            other => Err(format!("unknown machine status: {other}")),
        }
    }
}

/// One row of the machine registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Machine {
    pub system_name: String,
    pub location: String,
    pub table_name: TableName,
    pub os_type: Option<String>,
    pub hostname: Option<String>,
    pub public_ip: Option<String>,
    pub registered_at: Timestamp,
    /// Time of the last accepted sample; `None` until the first one.
    pub last_seen: Option<Timestamp>,
    pub status: MachineStatus,
}

/// Registry upsert issued by registration and by sample ingestion.
///
/// Inserts the entry (online) when `table_name` is unseen; otherwise
/// refreshes the descriptive fields and, when `last_seen` is set, advances
/// it and marks the machine online. Without `last_seen` the persisted
/// status is left alone. `None` descriptive fields keep the stored value, except
/// `public_ip` which always reflects the latest report.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineUpsert {
    pub system_name: String,
    pub location: String,
    pub table_name: TableName,
    pub os_type: Option<String>,
    pub hostname: Option<String>,
    pub public_ip: Option<String>,
    pub last_seen: Option<Timestamp>,
}
