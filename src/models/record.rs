//! Telemetry record model

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::InferenceResult;

pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const IS_BOT_FIELD: &str = "is_bot";
pub const CONFIDENCE_FIELD: &str = "confidence";

/// One client-submitted behavioral sample.
///
/// Arbitrary keys are kept as sent (minus NUL characters); the server only adds or overwrites
/// `timestamp`, `is_bot` and `confidence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelemetryRecord(Map<String, Value>);

impl TelemetryRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a request body. Anything that is not a JSON object yields an
    /// empty record so field defaults apply. NUL characters are dropped from
    /// keys and strings; JSONB cannot store them.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self(strip_nul_fields(fields)),
            Ok(other) => {
                tracing::warn!("Telemetry body is not an object ({}), using empty record", kind_of(&other));
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Telemetry body is not valid JSON ({}), using empty record", e);
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric value of a field; `None` when missing or not a JSON number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    /// Set the server-side receive time, overwriting any client value
    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.0.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }

    /// Attach the scoring outcome; absent verdicts become JSON null
    pub fn attach(&mut self, result: &InferenceResult) {
        self.0.insert(
            IS_BOT_FIELD.to_string(),
            result.is_bot().map(Value::Bool).unwrap_or(Value::Null),
        );
        self.0.insert(
            CONFIDENCE_FIELD.to_string(),
            result
                .confidence()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
    }

    pub fn is_bot(&self) -> Option<bool> {
        self.0.get(IS_BOT_FIELD).and_then(Value::as_bool)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.number(CONFIDENCE_FIELD)
    }
}

impl From<Map<String, Value>> for TelemetryRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn strip_nul(text: String) -> String {
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text
    }
}

fn strip_nul_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (strip_nul(key), strip_nul_value(value)))
        .collect()
}

fn strip_nul_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(strip_nul(text)),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nul_value).collect()),
        Value::Object(fields) => Value::Object(strip_nul_fields(fields)),
        other => other,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Response body for `POST /collect`
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectResponse {
    pub message: String,
    pub is_bot: Option<bool>,
    pub confidence: Option<f64>,
}

impl CollectResponse {
    pub fn received(result: &InferenceResult) -> Self {
        Self {
            message: "Data received".to_string(),
            is_bot: result.is_bot(),
            confidence: result.confidence(),
        }
    }
}
