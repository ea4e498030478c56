use axum::routing::post;
use axum::Router;

use crate::handlers::ingest;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(ingest::register))
        .route("/metrics", post(ingest::submit_metrics))
}
