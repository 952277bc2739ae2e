//! Persistence Sink - append-only store for enriched records

use std::future::Future;

use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool};

use crate::models::TelemetryRecord;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Where enriched records go. Implementations must tolerate concurrent
/// inserts; handlers share one instance.
pub trait RecordSink: Clone + Send + Sync + 'static {
    fn insert(&self, record: &TelemetryRecord)
        -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Most recent records, newest first
    fn recent(&self, limit: i64)
        -> impl Future<Output = Result<Vec<TelemetryRecord>, PersistenceError>> + Send;
}

/// PostgreSQL sink storing each record as a JSONB document
#[derive(Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordSink for PgSink {
    async fn insert(&self, record: &TelemetryRecord) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO telemetry_records (document, is_bot, confidence)
            VALUES ($1, $2, $3)
            "#
        )
        .bind(Json(record.fields()))
        .bind(record.is_bot())
        .bind(record.confidence())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<TelemetryRecord>, PersistenceError> {
        let rows = sqlx::query_scalar::<_, Json<Map<String, Value>>>(
            "SELECT document FROM telemetry_records ORDER BY id DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(fields)| TelemetryRecord::new(fields)).collect())
    }
}
