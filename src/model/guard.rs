//! Inference Guard - scoring that never fails a request
//!
//! Wraps the optional classifier. Every failure mode (no model, wrong input
//! shape, model error, bad output, even a panic inside the model) ends up as an
//! absent verdict plus a log line and a counter.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::features::{FeatureVector, LayoutInfo};
use super::classifier::Classifier;
use super::loader::{LoadedModel, ModelInfo};
use super::{InferenceResult, ScoringError, Verdict};

/// Process-lifetime counters
#[derive(Debug, Default)]
struct Counters {
    scored: AtomicU64,
    failures: AtomicU64,
    unscored: AtomicU64,
    padded: AtomicU64,
    latency_us: AtomicU64,
}

/// Status snapshot for `/status`
#[derive(Debug, Clone, Serialize)]
pub struct InferenceStatus {
    pub model_loaded: bool,
    pub model: Option<ModelInfo>,
    pub layout: LayoutInfo,
    pub inference_count: u64,
    pub scoring_failures: u64,
    /// Requests handled while no model was loaded
    pub unscored_requests: u64,
    /// Vectors zero-padded past the natural features
    pub padded_vectors: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug)]
pub struct InferenceGuard {
    model: Option<LoadedModel>,
    counters: Counters,
}

impl InferenceGuard {
    pub fn new(model: Option<LoadedModel>) -> Self {
        Self {
            model,
            counters: Counters::default(),
        }
    }

    /// Guard without a classifier (ingestion-only mode)
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    /// Input length the loaded classifier expects; `None` without a model
    pub fn expected_dimension(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.classifier.expected_dimension())
    }

    /// Run the classifier. `Ok(None)` means no model is loaded.
    pub fn try_score(&self, features: &FeatureVector) -> Result<Option<Verdict>, ScoringError> {
        let Some(model) = &self.model else {
            return Ok(None);
        };

        let x = features.as_slice();
        let outcome = catch_unwind(AssertUnwindSafe(|| predict(&model.classifier, x)));
        match outcome {
            Ok(result) => result.map(Some),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ScoringError::Model(format!("classifier panicked: {}", reason)))
            }
        }
    }

    /// Score a vector, collapsing every failure to an absent result
    pub fn score(&self, features: &FeatureVector) -> InferenceResult {
        if self.model.is_none() {
            self.counters.unscored.fetch_add(1, Ordering::Relaxed);
            return InferenceResult::absent();
        }

        if features.is_padded() {
            self.counters.padded.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(features = %features.to_log_entry(), "Feature vector zero-padded for classifier");
        }

        let start = Instant::now();
        match self.try_score(features) {
            Ok(Some(verdict)) => {
                let elapsed = start.elapsed().as_micros() as u64;
                self.counters.latency_us.fetch_add(elapsed, Ordering::Relaxed);
                self.counters.scored.fetch_add(1, Ordering::Relaxed);
                InferenceResult::from(verdict)
            }
            Ok(None) => InferenceResult::absent(),
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Scoring failed, returning empty verdict: {}", e);
                InferenceResult::absent()
            }
        }
    }

    pub fn status(&self) -> InferenceStatus {
        let scored = self.counters.scored.load(Ordering::Relaxed);
        let latency = self.counters.latency_us.load(Ordering::Relaxed);
        let avg_latency_ms = if scored > 0 {
            latency as f64 / scored as f64 / 1000.0
        } else {
            0.0
        };

        InferenceStatus {
            model_loaded: self.model.is_some(),
            model: self.model.as_ref().map(|m| m.info.clone()),
            layout: LayoutInfo::current(),
            inference_count: scored,
            scoring_failures: self.counters.failures.load(Ordering::Relaxed),
            unscored_requests: self.counters.unscored.load(Ordering::Relaxed),
            padded_vectors: self.counters.padded.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }
}

fn predict(classifier: &Classifier, x: &[f64]) -> Result<Verdict, ScoringError> {
    match classifier {
        Classifier::LabelOnly(model) => {
            let is_bot = model.predict(x)?;
            // no probability output: the label itself is the confidence
            Ok(Verdict::new(is_bot, if is_bot { 1.0 } else { 0.0 }))
        }
        Classifier::LabelWithConfidence(model) => {
            let is_bot = model.predict(x)?;
            let confidence = model.predict_proba(x)?;
            if confidence.is_nan() {
                return Err(ScoringError::NonNumericOutput(confidence.to_string()));
            }
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ScoringError::ConfidenceOutOfRange(confidence));
            }
            Ok(Verdict::new(is_bot, confidence))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classifier::{Capability, LabelModel, ProbabilisticModel};
    use crate::model::loader::load_from_bytes;
    use crate::models::TelemetryRecord;
    use chrono::Utc;

    /// Classifier returning a fixed answer
    struct Fixed {
        dim: usize,
        label: bool,
        proba: f64,
    }

    impl LabelModel for Fixed {
        fn input_dimension(&self) -> usize {
            self.dim
        }

        fn predict(&self, features: &[f64]) -> Result<bool, ScoringError> {
            if features.len() != self.dim {
                return Err(ScoringError::ShapeMismatch { expected: self.dim, actual: features.len() });
            }
            Ok(self.label)
        }
    }

    impl ProbabilisticModel for Fixed {
        fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError> {
            self.predict(features)?;
            Ok(self.proba)
        }
    }

    struct Exploding;

    impl LabelModel for Exploding {
        fn input_dimension(&self) -> usize {
            5
        }

        fn predict(&self, _features: &[f64]) -> Result<bool, ScoringError> {
            panic!("tensor buffer corrupted")
        }
    }

    fn guard_with(classifier: Classifier) -> InferenceGuard {
        let info = ModelInfo {
            source: "<test>".to_string(),
            kind: "fixed",
            capability: classifier.capability(),
            expected_dimension: classifier.expected_dimension(),
            digest: String::new(),
            declared_features: None,
            layout_matches: None,
            loaded_at: Utc::now(),
        };
        InferenceGuard::new(Some(LoadedModel { classifier, info }))
    }

    fn fixed(dim: usize, label: bool, proba: f64) -> InferenceGuard {
        guard_with(Classifier::LabelWithConfidence(Box::new(Fixed { dim, label, proba })))
    }

    #[test]
    fn test_disabled_guard_returns_absent() {
        let guard = InferenceGuard::disabled();
        assert_eq!(guard.expected_dimension(), None);
        assert_eq!(guard.try_score(&FeatureVector::from_values(vec![1.0; 5])), Ok(None));

        let result = guard.score(&FeatureVector::from_values(vec![1.0; 5]));
        assert_eq!(result, InferenceResult::absent());
        assert_eq!(guard.status().unscored_requests, 1);
        assert!(!guard.status().model_loaded);
    }

    #[test]
    fn test_probability_model_reports_confidence() {
        let guard = fixed(5, true, 0.92);
        let result = guard.score(&FeatureVector::from_values(vec![50.0, 3.0, 0.8, 8.0, 4.0]));
        assert_eq!(result.is_bot(), Some(true));
        assert_eq!(result.confidence(), Some(0.92));
        assert_eq!(guard.status().inference_count, 1);
    }

    #[test]
    fn test_label_only_model_synthesizes_confidence() {
        let guard = guard_with(Classifier::LabelOnly(Box::new(Fixed { dim: 5, label: true, proba: 0.3 })));
        let result = guard.score(&FeatureVector::from_values(vec![0.0; 5]));
        assert_eq!(result.verdict(), Some(Verdict::new(true, 1.0)));

        let guard = guard_with(Classifier::LabelOnly(Box::new(Fixed { dim: 5, label: false, proba: 0.3 })));
        let result = guard.score(&FeatureVector::from_values(vec![0.0; 5]));
        assert_eq!(result.verdict(), Some(Verdict::new(false, 0.0)));
    }

    #[test]
    fn test_shape_mismatch_degrades_to_absent() {
        let guard = fixed(3, true, 0.9);
        let vector = FeatureVector::adapt(&TelemetryRecord::default(), guard.expected_dimension());
        assert_eq!(vector.len(), 5);

        assert!(matches!(
            guard.try_score(&vector),
            Err(ScoringError::ShapeMismatch { expected: 3, actual: 5 })
        ));
        assert_eq!(guard.score(&vector), InferenceResult::absent());
        assert_eq!(guard.status().scoring_failures, 1);
    }

    #[test]
    fn test_out_of_range_confidence_degrades_to_absent() {
        for proba in [1.5, -0.1, f64::NAN] {
            let guard = fixed(5, true, proba);
            let result = guard.score(&FeatureVector::from_values(vec![0.0; 5]));
            assert_eq!(result, InferenceResult::absent());
            assert_eq!(result.is_bot().is_some(), result.confidence().is_some());
        }
    }

    #[test]
    fn test_panicking_model_degrades_to_absent() {
        let guard = guard_with(Classifier::LabelOnly(Box::new(Exploding)));
        let vector = FeatureVector::from_values(vec![0.0; 5]);
        match guard.try_score(&vector) {
            Err(ScoringError::Model(msg)) => assert!(msg.contains("tensor buffer corrupted")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(guard.score(&vector), InferenceResult::absent());
    }

    #[test]
    fn test_padding_is_counted() {
        let guard = fixed(7, false, 0.1);
        let vector = FeatureVector::adapt(&TelemetryRecord::default(), guard.expected_dimension());
        assert_eq!(vector.as_slice(), &[0.0; 7]);

        let result = guard.score(&vector);
        assert_eq!(result.verdict(), Some(Verdict::new(false, 0.1)));
        assert_eq!(guard.status().padded_vectors, 1);
    }

    #[test]
    fn test_loaded_artifact_end_to_end() {
        let model = load_from_bytes(
            br#"{"type": "logistic_regression", "weights": [0, -1, 0, 0, 0], "intercept": 2}"#,
            "<memory>",
        )
        .unwrap();
        let guard = InferenceGuard::new(Some(model));
        assert_eq!(guard.expected_dimension(), Some(5));

        let status = guard.status();
        assert!(status.model_loaded);
        assert_eq!(status.model.unwrap().capability, Capability::LabelWithConfidence);

        let record: TelemetryRecord = serde_json::from_str(r#"{"clickCount": 0}"#).unwrap();
        let result = guard.score(&FeatureVector::adapt(&record, guard.expected_dimension()));
        assert_eq!(result.is_bot(), Some(true));
        assert!(result.confidence().unwrap() > 0.5);
    }
}
