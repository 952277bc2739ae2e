//! Feature Vector - classifier input built from a telemetry record

use serde::Serialize;

use crate::models::TelemetryRecord;
use super::layout::{FEATURE_LAYOUT, NATURAL_FEATURE_COUNT};

/// Fixed-length numeric input for the classifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Read the layout fields from `record` and shape them for a model
    /// expecting `expected_dimension` inputs.
    ///
    /// Missing and non-numeric fields read as `0`. A known dimension above the
    /// natural length zero-pads on the right; anything else keeps the natural
    /// vector, so an under-sized model rejects it at prediction time.
    pub fn adapt(record: &TelemetryRecord, expected_dimension: Option<usize>) -> Self {
        let natural = FEATURE_LAYOUT
            .iter()
            .map(|name| record.number(name).unwrap_or(0.0));

        let mut values = match expected_dimension {
            Some(dim) if dim > NATURAL_FEATURE_COUNT => Vec::with_capacity(dim),
            _ => Vec::with_capacity(NATURAL_FEATURE_COUNT),
        };
        values.extend(natural);

        if let Some(dim) = expected_dimension {
            if dim > values.len() {
                values.resize(dim, 0.0);
            }
        }

        Self { values }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when zeros were appended beyond the natural features
    pub fn is_padded(&self) -> bool {
        self.values.len() > NATURAL_FEATURE_COUNT
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Named view for debug logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        let named: serde_json::Map<String, serde_json::Value> = FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect();
        serde_json::json!({
            "len": self.values.len(),
            "padded": self.is_padded(),
            "named_values": named,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> TelemetryRecord {
        TelemetryRecord::new(value.as_object().cloned().unwrap())
    }

    fn full_record() -> TelemetryRecord {
        record(json!({
            "keyPressCount": 50,
            "clickCount": 3,
            "scrollDepth": 0.8,
            "hardwareConcurrency": 8,
            "deviceMemory": 4
        }))
    }

    #[test]
    fn test_natural_order() {
        let vector = FeatureVector::adapt(&full_record(), Some(5));
        assert_eq!(vector.as_slice(), &[50.0, 3.0, 0.8, 8.0, 4.0]);
        assert!(!vector.is_padded());
    }

    #[test]
    fn test_unknown_dimension_keeps_natural_vector() {
        let vector = FeatureVector::adapt(&full_record(), None);
        assert_eq!(vector.len(), NATURAL_FEATURE_COUNT);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let partial = record(json!({"clickCount": 7, "deviceMemory": 8}));
        let vector = FeatureVector::adapt(&partial, None);
        assert_eq!(vector.as_slice(), &[0.0, 7.0, 0.0, 0.0, 8.0]);

        for missing in FEATURE_LAYOUT {
            let mut fields = full_record().into_fields();
            fields.remove(*missing);
            let vector = FeatureVector::adapt(&TelemetryRecord::new(fields), Some(5));
            let idx = crate::features::layout::feature_index(missing).unwrap();
            assert_eq!(vector.get(idx), Some(0.0), "{missing} should default to zero");
        }
    }

    #[test]
    fn test_non_numeric_values_coerce_to_zero() {
        let junk = record(json!({
            "keyPressCount": "50",
            "clickCount": null,
            "scrollDepth": [1, 2],
            "hardwareConcurrency": {"cores": 8},
            "deviceMemory": "Unknown"
        }));
        let vector = FeatureVector::adapt(&junk, Some(5));
        assert_eq!(vector.as_slice(), &[0.0; 5]);
    }

    #[test]
    fn test_padding_to_larger_dimension() {
        for dim in [6, 7, 16, 64] {
            let vector = FeatureVector::adapt(&full_record(), Some(dim));
            assert_eq!(vector.len(), dim);
            assert_eq!(&vector.as_slice()[..5], &[50.0, 3.0, 0.8, 8.0, 4.0]);
            assert!(vector.as_slice()[5..].iter().all(|v| *v == 0.0));
            assert!(vector.is_padded());
        }
    }

    #[test]
    fn test_empty_record_padded_to_seven() {
        let vector = FeatureVector::adapt(&TelemetryRecord::default(), Some(7));
        assert_eq!(vector.as_slice(), &[0.0; 7]);
    }

    #[test]
    fn test_smaller_dimension_is_not_truncated() {
        let vector = FeatureVector::adapt(&full_record(), Some(3));
        assert_eq!(vector.len(), NATURAL_FEATURE_COUNT);
    }

    #[test]
    fn test_adapt_is_idempotent() {
        let record = record(json!({"keyPressCount": 9, "scrollDepth": 1440, "extra": "kept"}));
        let before = record.clone();
        let first = FeatureVector::adapt(&record, Some(8));
        let second = FeatureVector::adapt(&record, Some(8));
        assert_eq!(first, second);
        assert_eq!(record, before);
    }

    #[test]
    fn test_log_entry_names_natural_features() {
        let entry = FeatureVector::adapt(&full_record(), Some(6)).to_log_entry();
        assert_eq!(entry["len"], 6);
        assert_eq!(entry["padded"], true);
        assert_eq!(entry["named_values"]["clickCount"], 3.0);
    }
}
