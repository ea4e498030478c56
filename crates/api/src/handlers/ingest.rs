//! Agent-facing write endpoints.

use axum::extract::State;
use axum::Json;
use fleetwatch_core::identifier::TableName;
use fleetwatch_core::telemetry::{MetricsPayload, RegisterPayload};
use serde::Serialize;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::api_key::ApiKey;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub table_name: TableName,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

/// POST /register
///
/// Register or refresh a machine and provision its sample relation.
pub async fn register(
    State(state): State<AppState>,
    _key: ApiKey,
    AppJson(payload): AppJson<RegisterPayload>,
) -> AppResult<Json<RegisterResponse>> {
    let table_name = state.ingest.register(payload).await?;
    Ok(Json(RegisterResponse {
        status: "registered",
        table_name,
    }))
}

/// POST /metrics
///
/// Store one telemetry sample and refresh the machine's `last_seen`.
pub async fn submit_metrics(
    State(state): State<AppState>,
    _key: ApiKey,
    AppJson(payload): AppJson<MetricsPayload>,
) -> AppResult<Json<AcceptedResponse>> {
    state.ingest.record_sample(payload).await?;
    Ok(Json(AcceptedResponse { status: "ok" }))
}
