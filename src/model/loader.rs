//! Model Loader - reads a serialized classifier once at startup
//!
//! Artifacts are JSON documents tagged by `"type"`:
//!
//! ```json
//! {"type": "logistic_regression", "weights": [..], "intercept": -1.2, "threshold": 0.5,
//!  "features": ["keyPressCount", "clickCount", "scrollDepth", "hardwareConcurrency", "deviceMemory"]}
//! {"type": "random_forest", "n_features": 5, "trees": [{"nodes": [..]}]}
//! {"type": "linear_svm", "weights": [..], "intercept": 0.3}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::features::layout::layout_prefix_matches;
use super::classifier::{
    Capability, Classifier, DecisionTree, LinearSvm, LogisticRegression, RandomForest, TreeNode,
};

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read model {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// On-disk artifact envelope
#[derive(Debug, Deserialize)]
struct ArtifactFile {
    /// Feature names the model was trained on, in input order
    #[serde(default)]
    features: Option<Vec<String>>,
    #[serde(flatten)]
    model: ModelSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModelSpec {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    LinearSvm(LinearSvm),
}

impl ModelSpec {
    fn kind(&self) -> &'static str {
        match self {
            ModelSpec::LogisticRegression(_) => "logistic_regression",
            ModelSpec::RandomForest(_) => "random_forest",
            ModelSpec::LinearSvm(_) => "linear_svm",
        }
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        match self {
            ModelSpec::LogisticRegression(m) => {
                validate_linear(&m.weights, m.intercept)?;
                validate_threshold(m.threshold)
            }
            ModelSpec::LinearSvm(m) => validate_linear(&m.weights, m.intercept),
            ModelSpec::RandomForest(m) => {
                if m.n_features == 0 {
                    return invalid("random forest declares zero features");
                }
                if m.trees.is_empty() {
                    return invalid("random forest has no trees");
                }
                for (i, tree) in m.trees.iter().enumerate() {
                    validate_tree(tree, m.n_features)
                        .map_err(|e| ModelLoadError::Invalid(format!("tree {}: {}", i, e)))?;
                }
                validate_threshold(m.threshold)
            }
        }
    }

    fn into_classifier(self) -> Classifier {
        match self {
            ModelSpec::LogisticRegression(m) => Classifier::LabelWithConfidence(Box::new(m)),
            ModelSpec::RandomForest(m) => Classifier::LabelWithConfidence(Box::new(m)),
            ModelSpec::LinearSvm(m) => Classifier::LabelOnly(Box::new(m)),
        }
    }
}

fn invalid<T>(msg: &str) -> Result<T, ModelLoadError> {
    Err(ModelLoadError::Invalid(msg.to_string()))
}

fn validate_linear(weights: &[f64], intercept: f64) -> Result<(), ModelLoadError> {
    if weights.is_empty() {
        return invalid("weights are empty");
    }
    if !intercept.is_finite() || weights.iter().any(|w| !w.is_finite()) {
        return invalid("weights must be finite");
    }
    Ok(())
}

fn validate_threshold(threshold: f64) -> Result<(), ModelLoadError> {
    if !(0.0..=1.0).contains(&threshold) {
        return invalid("threshold must be within [0, 1]");
    }
    Ok(())
}

/// Children must point forward, which also rules out cycles
fn validate_tree(tree: &DecisionTree, n_features: usize) -> Result<(), String> {
    if tree.nodes.is_empty() {
        return Err("empty tree".to_string());
    }
    for (idx, node) in tree.nodes.iter().enumerate() {
        match node {
            TreeNode::Leaf { value } => {
                if !(0.0..=1.0).contains(value) {
                    return Err(format!("leaf {} value {} outside [0, 1]", idx, value));
                }
            }
            TreeNode::Split { feature, threshold, left, right } => {
                if *feature >= n_features {
                    return Err(format!("node {} splits on feature {} of {}", idx, feature, n_features));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {} has non-finite threshold", idx));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= tree.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Where a loaded model came from
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub source: String,
    pub kind: &'static str,
    pub capability: Capability,
    pub expected_dimension: usize,
    /// SHA-256 of the artifact bytes
    pub digest: String,
    pub declared_features: Option<Vec<String>>,
    /// `None` when the artifact does not declare its features
    pub layout_matches: Option<bool>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct LoadedModel {
    pub classifier: Classifier,
    pub info: ModelInfo,
}

/// Load a model at startup. Any failure disables scoring instead of
/// stopping the process.
pub fn load(path: Option<&Path>) -> Option<LoadedModel> {
    let Some(path) = path else {
        tracing::warn!("MODEL_PATH not set; running in ingestion-only mode");
        return None;
    };

    match load_from_file(path) {
        Ok(model) => {
            tracing::info!(
                kind = model.info.kind,
                capability = ?model.info.capability,
                expected_dimension = model.info.expected_dimension,
                digest = %model.info.digest,
                "Classifier loaded from {}",
                path.display()
            );
            Some(model)
        }
        Err(e) => {
            tracing::warn!("Classifier unavailable ({}); running in ingestion-only mode", e);
            None
        }
    }
}

/// Load a model artifact from disk
pub fn load_from_file(path: &Path) -> Result<LoadedModel, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    load_from_bytes(&bytes, &path.display().to_string())
}

/// Load a model artifact from memory
pub fn load_from_bytes(bytes: &[u8], source: &str) -> Result<LoadedModel, ModelLoadError> {
    let artifact: ArtifactFile = serde_json::from_slice(bytes)?;
    artifact.model.validate()?;

    let kind = artifact.model.kind();
    let classifier = artifact.model.into_classifier();
    let expected_dimension = classifier.expected_dimension();

    if let Some(declared) = &artifact.features {
        if declared.len() != expected_dimension {
            return Err(ModelLoadError::Invalid(format!(
                "declares {} features but takes {} inputs",
                declared.len(),
                expected_dimension
            )));
        }
    }

    let layout_matches = artifact.features.as_deref().map(layout_prefix_matches);
    if layout_matches == Some(false) {
        tracing::warn!(
            declared = ?artifact.features,
            "Classifier was trained on a different feature layout; predictions may be meaningless"
        );
    }

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());

    Ok(LoadedModel {
        info: ModelInfo {
            source: source.to_string(),
            kind,
            capability: classifier.capability(),
            expected_dimension,
            digest,
            declared_features: artifact.features,
            layout_matches,
            loaded_at: Utc::now(),
        },
        classifier,
    })
}
