pub mod health;
pub mod ingest;
pub mod machines;

use axum::Router;

use crate::state::AppState;

/// Build the authenticated route tree.
///
/// ```text
/// POST /register                               register or refresh a machine
/// POST /metrics                                submit one sample
///
/// GET  /machines                               registry listing
/// GET  /machines/{table_name}/latest           most recent sample
/// GET  /machines/{table_name}/history          samples within ?minutes=
/// ```
///
/// Every route here requires `x-api-key` (enforced by handler extractors).
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(ingest::router())
        .nest("/machines", machines::router())
}
