//! Fleetwatch domain core.
//!
//! Pure logic shared by the API server and the monitor: identifier
//! derivation, telemetry decoding, the liveness state machine, threshold
//! evaluation, and the storage and notifier seams they run against.

pub mod alert;
pub mod error;
pub mod identifier;
pub mod ingest;
pub mod liveness;
pub mod machine;
pub mod memory;
pub mod metric_names;
pub mod notifier;
pub mod store;
pub mod telemetry;
pub mod thresholds;
pub mod types;
