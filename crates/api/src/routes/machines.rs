use axum::routing::get;
use axum::Router;

use crate::handlers::machines;
use crate::state::AppState;

/// Routes mounted at `/machines`.
///
/// ```text
/// GET /                          -> list_machines
/// GET /{table_name}/latest       -> get_latest
/// GET /{table_name}/history      -> get_history
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(machines::list_machines))
        .route("/{table_name}/latest", get(machines::get_latest))
        .route("/{table_name}/history", get(machines::get_history))
}
