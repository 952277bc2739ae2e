//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::model::InferenceStatus;
use crate::sink::RecordSink;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    scoring_enabled: bool,
    timestamp: i64,
}

/// Liveness probe
pub async fn home() -> &'static str {
    "Telemetry collector running!"
}

pub async fn check<S: RecordSink>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        scoring_enabled: state.guard.is_enabled(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Classifier state and counters
pub async fn status<S: RecordSink>(State(state): State<AppState<S>>) -> Json<InferenceStatus> {
    Json(state.guard.status())
}
