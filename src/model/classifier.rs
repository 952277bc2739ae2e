//! Classifier - bot/human models and their capabilities
//!
//! A classifier either predicts only a label or a label together with the
//! positive-class probability. The capability is fixed when the artifact is
//! loaded, never probed per request.

use serde::{Deserialize, Serialize};

use super::ScoringError;

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

/// Model that can only say bot / not bot
pub trait LabelModel: Send + Sync {
    /// Number of inputs the model was trained on
    fn input_dimension(&self) -> usize;

    /// `true` means bot
    fn predict(&self, features: &[f64]) -> Result<bool, ScoringError>;
}

/// Model that also exposes P(bot)
pub trait ProbabilisticModel: LabelModel {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    LabelOnly,
    LabelWithConfidence,
}

/// A loaded classifier tagged with what it can do
pub enum Classifier {
    LabelOnly(Box<dyn LabelModel>),
    LabelWithConfidence(Box<dyn ProbabilisticModel>),
}

impl Classifier {
    pub fn capability(&self) -> Capability {
        match self {
            Classifier::LabelOnly(_) => Capability::LabelOnly,
            Classifier::LabelWithConfidence(_) => Capability::LabelWithConfidence,
        }
    }

    pub fn expected_dimension(&self) -> usize {
        match self {
            Classifier::LabelOnly(m) => m.input_dimension(),
            Classifier::LabelWithConfidence(m) => m.input_dimension(),
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("capability", &self.capability())
            .field("expected_dimension", &self.expected_dimension())
            .finish()
    }
}

fn check_shape(expected: usize, features: &[f64]) -> Result<(), ScoringError> {
    if features.len() != expected {
        return Err(ScoringError::ShapeMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

fn dot(weights: &[f64], features: &[f64]) -> f64 {
    weights.iter().zip(features).map(|(w, x)| w * x).sum()
}

fn finite(value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScoringError::NonNumericOutput(value.to_string()))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn default_threshold() -> f64 {
    0.5
}

// ============================================================================
// LOGISTIC REGRESSION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub intercept: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LabelModel for LogisticRegression {
    fn input_dimension(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, features: &[f64]) -> Result<bool, ScoringError> {
        Ok(self.predict_proba(features)? >= self.threshold)
    }
}

impl ProbabilisticModel for LogisticRegression {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError> {
        check_shape(self.weights.len(), features)?;
        let z = finite(dot(&self.weights, features) + self.intercept)?;
        Ok(sigmoid(z))
    }
}

// ============================================================================
// LINEAR SVM (label only)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LabelModel for LinearSvm {
    fn input_dimension(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, features: &[f64]) -> Result<bool, ScoringError> {
        check_shape(self.weights.len(), features)?;
        let margin = finite(dot(&self.weights, features) + self.intercept)?;
        Ok(margin > 0.0)
    }
}

// ============================================================================
// RANDOM FOREST
// ============================================================================

/// Node of a flattened decision tree; index 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// P(bot) at this leaf
    Leaf { value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk from the root; `x <= threshold` goes left
    fn leaf_value(&self, features: &[f64]) -> Result<f64, ScoringError> {
        let mut idx = 0;
        // a valid tree never visits more nodes than it has
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    let x = features.get(*feature).copied().ok_or_else(|| {
                        ScoringError::Model(format!("split on missing feature {}", feature))
                    })?;
                    idx = if x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ScoringError::Model(format!("dangling node index {}", idx)));
                }
            }
        }
        Err(ScoringError::Model("tree walk did not terminate".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LabelModel for RandomForest {
    fn input_dimension(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<bool, ScoringError> {
        Ok(self.predict_proba(features)? >= self.threshold)
    }
}

impl ProbabilisticModel for RandomForest {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ScoringError> {
        check_shape(self.n_features, features)?;
        if self.trees.is_empty() {
            return Err(ScoringError::Model("forest has no trees".to_string()));
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.leaf_value(features)?;
        }
        finite(sum / self.trees.len() as f64)
    }
}
