//! Stored record handlers

use axum::{extract::{rejection::QueryRejection, Query, State}, Json};
use serde::Deserialize;
use validator::Validate;

use crate::models::{SessionStats, TelemetryRecord};
use crate::sink::RecordSink;
use crate::{AppResult, AppState};

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct ListQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
}

/// List the most recent records
pub async fn list<S: RecordSink>(
    State(state): State<AppState<S>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<TelemetryRecord>>> {
    let Query(query) = query?;
    query.validate()?;

    let records = state.sink.recent(query.limit.unwrap_or(DEFAULT_LIMIT)).await?;
    Ok(Json(records))
}

/// Dashboard summary over the configured window
pub async fn stats<S: RecordSink>(
    State(state): State<AppState<S>>,
) -> AppResult<Json<SessionStats>> {
    let records = state.sink.recent(state.config.stats_window).await?;
    tracing::debug!("Summarizing {} records", records.len());

    Ok(Json(SessionStats::summarize(&records)))
}
