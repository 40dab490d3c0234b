//! Prediction service — owns the loaded model artifact, aligns incoming
//! feature vectors to the training schema, and serves probabilities.
//!
//! The artifact is held behind an `RwLock<Option<Arc<...>>>`: `predict`
//! clones the Arc under a read lock and works on that snapshot, so a
//! concurrent reload is observed as all-old or all-new, never half-swapped.

use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::ModelError;
use crate::features::vector::FeatureVector;
use crate::predict::model::ModelArtifact;

/// Result of one inference call.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub success_probability: f64,
    pub model_info: String,
}

pub struct PredictionService {
    artifact_path: String,
    model: RwLock<Option<Arc<ModelArtifact>>>,
}

impl PredictionService {
    /// Create an unloaded service. Call [`load`](Self::load) or
    /// [`reload`](Self::reload) to install an artifact.
    pub fn new(artifact_path: impl Into<String>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            model: RwLock::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn model_info(&self) -> Option<String> {
        self.model.read().as_ref().map(|m| m.model_info.clone())
    }

    /// Load an artifact from `path`. On any failure the currently-held model
    /// (possibly none) is left untouched.
    pub fn load(&self, path: &str) -> Result<(), ModelError> {
        let raw = fs::read_to_string(path).map_err(|e| ModelError::Load {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let artifact: ModelArtifact =
            serde_json::from_str(&raw).map_err(|e| ModelError::Load {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        artifact.validate().map_err(|reason| ModelError::Load {
            path: path.to_string(),
            reason,
        })?;

        self.install(artifact);
        Ok(())
    }

    /// Atomically replace the held model.
    pub fn install(&self, artifact: ModelArtifact) {
        info!(
            model_info = %artifact.model_info,
            trees = artifact.trees.len(),
            has_feature_names = artifact.feature_names().is_some(),
            "model artifact installed"
        );
        *self.model.write() = Some(Arc::new(artifact));
    }

    /// Re-load from the configured artifact path.
    pub fn reload(&self) -> Result<(), ModelError> {
        let path = self.artifact_path.clone();
        self.load(&path)
    }

    /// Score a named feature vector.
    ///
    /// When the artifact exposes its trained feature names, the input is
    /// reindexed by name: missing names are imputed as 0.0, extra input
    /// features are dropped. Without names the service falls back to the
    /// input's own order, which is only correct when the caller assembled
    /// the vector in training order — hence the loud warning.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        let model = self
            .model
            .read()
            .as_ref()
            .cloned()
            .ok_or(ModelError::NotLoaded)?;

        let row: Vec<f64> = match model.feature_names() {
            Some(names) => {
                let mut missing = 0usize;
                let row: Vec<f64> = names
                    .iter()
                    .map(|n| {
                        features.get(n).unwrap_or_else(|| {
                            missing += 1;
                            0.0
                        })
                    })
                    .collect();

                let extra = features.len() + missing - names.len();
                if missing > 0 || extra > 0 {
                    warn!(
                        missing,
                        extra,
                        model_info = %model.model_info,
                        "feature vector did not match training schema exactly"
                    );
                }
                row
            }
            None => {
                warn!(
                    model_info = %model.model_info,
                    "model artifact exposes no feature names; aligning by input order"
                );
                features.values().to_vec()
            }
        };

        let p = model.predict_row(&row)?;
        Ok(Prediction {
            success_probability: p.clamp(0.0, 1.0),
            model_info: model.model_info.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::model::{Tree, TreeNode};
    use std::io::Write;

    fn leaf(value: f64) -> TreeNode {
        TreeNode {
            feature: -1,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
        }
    }

    /// Stump on the named feature "x": < 0.5 → margin -2, else +2.
    fn artifact(info: &str, names: Option<Vec<String>>) -> ModelArtifact {
        ModelArtifact {
            model_info: info.into(),
            feature_names: names,
            base_score: 0.0,
            trees: vec![Tree {
                nodes: vec![
                    TreeNode {
                        feature: 0,
                        threshold: 0.5,
                        left: 1,
                        right: 2,
                        value: 0.0,
                    },
                    leaf(-2.0),
                    leaf(2.0),
                ],
            }],
        }
    }

    #[test]
    fn predict_without_model_is_not_loaded() {
        let svc = PredictionService::new("nonexistent.json");
        let fv = FeatureVector::new();
        assert!(matches!(svc.predict(&fv), Err(ModelError::NotLoaded)));
    }

    #[test]
    fn load_failure_leaves_previous_model() {
        let svc = PredictionService::new("unused.json");
        svc.install(artifact("v1", Some(vec!["x".into()])));

        assert!(svc.load("definitely/not/a/file.json").is_err());
        assert_eq!(svc.model_info().as_deref(), Some("v1"));

        // Corrupt JSON also leaves the model untouched
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"{ not json").unwrap();
        assert!(svc.load(f.path().to_str().unwrap()).is_err());
        assert_eq!(svc.model_info().as_deref(), Some("v1"));
    }

    #[test]
    fn load_from_file_roundtrip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&serde_json::json!({
            "model_info": "from-disk",
            "feature_names": ["x"],
            "base_score": 0.0,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                {"feature": -1, "value": -2.0},
                {"feature": -1, "value": 2.0}
            ]}]
        }))
        .unwrap();
        f.write_all(json.as_bytes()).unwrap();

        let svc = PredictionService::new(f.path().to_str().unwrap());
        svc.reload().unwrap();
        assert_eq!(svc.model_info().as_deref(), Some("from-disk"));
    }

    #[test]
    fn aligns_by_name_imputing_missing_and_dropping_extras() {
        let svc = PredictionService::new("unused.json");
        svc.install(artifact("v1", Some(vec!["x".into()])));

        // "x" missing → imputed 0.0 → low branch; extras ignored
        let mut fv = FeatureVector::new();
        fv.insert("unrelated", 99.0);
        let p = svc.predict(&fv).unwrap();
        assert!(p.success_probability < 0.5);

        let mut fv = FeatureVector::new();
        fv.insert("extra_first", 123.0);
        fv.insert("x", 1.0);
        let p = svc.predict(&fv).unwrap();
        assert!(p.success_probability > 0.5);
        assert_eq!(p.model_info, "v1");
    }

    #[test]
    fn falls_back_to_positional_order_without_names() {
        let svc = PredictionService::new("unused.json");
        svc.install(artifact("nameless", None));

        let mut fv = FeatureVector::new();
        fv.insert("whatever", 1.0); // position 0 → feature 0
        let p = svc.predict(&fv).unwrap();
        assert!(p.success_probability > 0.5);
    }

    #[test]
    fn reload_is_atomic_under_concurrent_predicts() {
        let svc = Arc::new(PredictionService::new("unused.json"));
        svc.install(artifact("old", Some(vec!["x".into()])));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let svc = svc.clone();
                std::thread::spawn(move || {
                    let mut fv = FeatureVector::new();
                    fv.insert("x", 1.0);
                    for _ in 0..2000 {
                        let p = svc.predict(&fv).expect("model is always loaded");
                        // Every observation is a complete artifact
                        assert!(p.model_info == "old" || p.model_info == "new");
                        assert!(p.success_probability > 0.5);
                    }
                })
            })
            .collect();

        let writer = {
            let svc = svc.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let info = if i % 2 == 0 { "new" } else { "old" };
                    svc.install(artifact(info, Some(vec!["x".into()])));
                }
            })
        };

        for r in readers {
            r.join().unwrap();
        }
        writer.join().unwrap();
    }
}
