//! Model Module - bot classifier loading and guarded inference

pub mod classifier;
pub mod guard;
pub mod loader;

pub use guard::{InferenceGuard, InferenceStatus};

use serde::Serialize;

/// Why a single prediction could not be produced
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("feature vector has {actual} values, model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("model produced a non-numeric output: {0}")]
    NonNumericOutput(String),

    #[error("model confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("model error: {0}")]
    Model(String),
}

/// A scored sample: label plus confidence, always together
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub is_bot: bool,
    pub confidence: f64,
}

impl Verdict {
    pub fn new(is_bot: bool, confidence: f64) -> Self {
        Self { is_bot, confidence }
    }
}

/// Scoring outcome; absent when no model is loaded or scoring failed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InferenceResult(Option<Verdict>);

impl InferenceResult {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.0
    }

    pub fn is_bot(&self) -> Option<bool> {
        self.0.map(|v| v.is_bot)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.0.map(|v| v.confidence)
    }
}

impl From<Verdict> for InferenceResult {
    fn from(verdict: Verdict) -> Self {
        Self(Some(verdict))
    }
}
