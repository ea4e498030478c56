//! Dashboard read endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use fleetwatch_core::error::CoreError;
use fleetwatch_core::identifier::TableName;
use fleetwatch_core::machine::Machine;
use fleetwatch_core::telemetry::{HistoryPoint, MetricSample};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::api_key::ApiKey;
use crate::state::AppState;

/// Default history window in minutes.
const DEFAULT_HISTORY_MINUTES: i64 = 60;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Window size in minutes (default: 60).
    pub minutes: Option<i64>,
}

/// Sanitize a path segment into a table name; an empty result is a 404.
fn resolve_table(raw: &str) -> AppResult<TableName> {
    TableName::sanitize(raw).ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "machine",
            key: raw.to_string(),
        })
    })
}

/// GET /machines
pub async fn list_machines(
    State(state): State<AppState>,
    _key: ApiKey,
) -> AppResult<Json<Vec<Machine>>> {
    Ok(Json(state.store.list_machines().await?))
}

/// GET /machines/{table_name}/latest
///
/// Most recent sample by `(ts, id)`; 404 when the machine has none.
pub async fn get_latest(
    State(state): State<AppState>,
    _key: ApiKey,
    Path(table_name): Path<String>,
) -> AppResult<Json<MetricSample>> {
    let table = resolve_table(&table_name)?;
    let sample = state.store.latest_sample(&table).await?.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "sample for",
            key: table.to_string(),
        })
    })?;
    Ok(Json(sample))
}

/// GET /machines/{table_name}/history?minutes=60
///
/// Samples captured within the last `minutes`, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    _key: ApiKey,
    Path(table_name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HistoryPoint>>> {
    let table = resolve_table(&table_name)?;
    let minutes = query.minutes.unwrap_or(DEFAULT_HISTORY_MINUTES);
    if minutes <= 0 {
        return Err(AppError::BadRequest("minutes must be positive".into()));
    }
    let since = Duration::try_minutes(minutes)
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| AppError::BadRequest("minutes is out of range".into()))?;

    Ok(Json(state.store.history(&table, since).await?))
}
