//! HTTP handlers

pub mod health;
pub mod collect;
pub mod records;

#[cfg(test)]
pub(crate) mod test_support {
    //! Router fixtures shared by handler tests

    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use chrono::Utc;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::model::classifier::{Classifier, LabelModel, ProbabilisticModel};
    use crate::model::loader::{LoadedModel, ModelInfo};
    use crate::model::{InferenceGuard, ScoringError};
    use crate::sink::memory::MemorySink;
    use crate::AppState;

    pub type Seen = Arc<Mutex<Vec<Vec<f64>>>>;

    /// Fixed-answer classifier that records every vector it is asked about
    struct Recording {
        dim: usize,
        label: bool,
        proba: f64,
        seen: Seen,
    }

    impl LabelModel for Recording {
        fn input_dimension(&self) -> usize {
            self.dim
        }

        fn predict(&self, features: &[f64]) -> Result<bool, ScoringError> {
            self.seen.lock().unwrap().push(features.to_vec());
            if features.len() != self.dim {
                return Err(ScoringError::ShapeMismatch { expected: self.dim, actual: features.len() });
            }
            Ok(self.label)
        }
    }

    impl ProbabilisticModel for Recording {
        fn predict_proba(&self, _features: &[f64]) -> Result<f64, ScoringError> {
            Ok(self.proba)
        }
    }

    pub fn fixed_guard(dim: usize, label: bool, proba: f64) -> (InferenceGuard, Seen) {
        let seen = Seen::default();
        let classifier = Classifier::LabelWithConfidence(Box::new(Recording {
            dim,
            label,
            proba,
            seen: seen.clone(),
        }));
        let info = ModelInfo {
            source: "<test>".to_string(),
            kind: "recording",
            capability: classifier.capability(),
            expected_dimension: dim,
            digest: String::new(),
            declared_features: None,
            layout_matches: None,
            loaded_at: Utc::now(),
        };
        (InferenceGuard::new(Some(LoadedModel { classifier, info })), seen)
    }

    pub fn test_config() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    pub fn test_app(guard: InferenceGuard, sink: MemorySink) -> Router {
        app_with(Arc::new(guard), sink)
    }

    pub fn app_with(guard: Arc<InferenceGuard>, sink: MemorySink) -> Router {
        app_with_config(guard, sink, test_config())
    }

    pub fn app_with_config(guard: Arc<InferenceGuard>, sink: MemorySink, config: Config) -> Router {
        crate::create_router(AppState {
            sink,
            guard,
            config: Arc::new(config),
        })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post_collect(app: Router, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/collect")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, request).await
    }
}
