//! Ingestion handler

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::features::FeatureVector;
use crate::models::{CollectResponse, TelemetryRecord};
use crate::sink::RecordSink;
use crate::{AppResult, AppState};

/// Receive a telemetry sample, score it and persist it.
///
/// Scoring problems never fail the request; only a body that cannot be read
/// or a failed insert does.
#[tracing::instrument(name = "collect", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn collect<S: RecordSink>(
    State(state): State<AppState<S>>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<(StatusCode, Json<CollectResponse>)> {
    let body = body?;

    let mut record = TelemetryRecord::from_body(&body);
    record.stamp(Utc::now());

    let features = FeatureVector::adapt(&record, state.guard.expected_dimension());
    let result = state.guard.score(&features);
    record.attach(&result);

    state.sink.insert(&record).await?;

    tracing::info!(
        is_bot = ?result.is_bot(),
        confidence = ?result.confidence(),
        "Telemetry record stored"
    );

    Ok((StatusCode::CREATED, Json(CollectResponse::received(&result))))
}
