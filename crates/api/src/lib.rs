//! Fleetwatch HTTP ingestion API.
//!
//! Exposes config, state, error handling, handlers and the router builder so
//! the binary and the integration tests assemble the exact same app.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod state;
