use std::sync::Arc;

use fleetwatch_core::ingest::IngestService;
use fleetwatch_core::store::MachineStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend for read endpoints and health checks.
    pub store: Arc<dyn MachineStore>,
    /// Write path for registrations and samples.
    pub ingest: Arc<IngestService>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn MachineStore>, config: ServerConfig) -> Self {
        Self {
            ingest: Arc::new(IngestService::new(Arc::clone(&store))),
            store,
            config: Arc::new(config),
        }
    }
}
