//! The serialized classifier artifact.
//!
//! The training pipeline (out of scope here) exports a gradient-boosted tree
//! ensemble as a single JSON blob: a list of trees, each a flat node array,
//! plus the ordered feature-name list the model was trained with. Inference
//! walks every tree, sums the leaf values onto `base_score`, and squashes the
//! margin through a sigmoid to get P(success).

use serde::Deserialize;

use crate::error::ModelError;

/// One node in a flattened decision tree. `feature = -1` marks a leaf, in
/// which case `value` is the leaf contribution; otherwise `left`/`right`
/// index into the same node array.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    pub feature: i32,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Walk the tree for one aligned row. Missing features read as 0.0.
    fn score(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.nodes.is_empty() {
            return Ok(0.0);
        }

        let mut idx = 0usize;
        // A well-formed tree terminates in depth <= node count; the bound
        // protects against corrupt artifacts with cyclic child links.
        for _ in 0..=self.nodes.len() {
            let node = self
                .nodes
                .get(idx)
                .ok_or_else(|| ModelError::Inference(format!("node index {} out of range", idx)))?;

            if node.feature < 0 {
                return Ok(node.value);
            }

            let x = row.get(node.feature as usize).copied().unwrap_or(0.0);
            idx = if x < node.threshold {
                node.left
            } else {
                node.right
            };
        }

        Err(ModelError::Inference("tree walk did not terminate".into()))
    }
}

/// A loaded model artifact. Immutable once deserialized — hot reload swaps
/// the whole artifact by reference, never mutates it in place.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    /// Human-readable identifier, e.g. "bid-success-gbdt v14 2026-08-01".
    pub model_info: String,
    /// Ordered feature names from training. Optional: old artifacts lack it,
    /// forcing the service into positional alignment.
    pub feature_names: Option<Vec<String>>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl ModelArtifact {
    /// Structural checks done once at load time so inference can't hit
    /// obviously-corrupt state.
    pub fn validate(&self) -> Result<(), String> {
        for (t, tree) in self.trees.iter().enumerate() {
            for (n, node) in tree.nodes.iter().enumerate() {
                if node.feature >= 0
                    && (node.left >= tree.nodes.len() || node.right >= tree.nodes.len())
                {
                    return Err(format!(
                        "tree {} node {} has child index out of range",
                        t, n
                    ));
                }
            }
        }
        if let Some(names) = &self.feature_names {
            if names.is_empty() {
                return Err("feature_names present but empty".into());
            }
        }
        Ok(())
    }

    /// P(success) for one feature row already aligned to the training schema.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        let mut margin = self.base_score;
        for tree in &self.trees {
            margin += tree.score(row)?;
        }
        Ok(sigmoid(margin))
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single stump: if feature 0 < 0.5 then -2.0 else +2.0.
    fn stump() -> ModelArtifact {
        ModelArtifact {
            model_info: "test-stump".into(),
            feature_names: Some(vec!["a".into(), "b".into()]),
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
                    TreeNode {
                        feature: -1,
                        threshold: 0.0,
                        left: 0,
                        right: 0,
                        value: -2.0,
                    },
                    TreeNode {
                        feature: -1,
                        threshold: 0.0,
                        left: 0,
                        right: 0,
                        value: 2.0,
                    },
                ],
            }],
        }
    }

    #[test]
    fn stump_splits_on_threshold() {
        let m = stump();
        let low = m.predict_row(&[0.0, 0.0]).unwrap();
        let high = m.predict_row(&[1.0, 0.0]).unwrap();
        assert!(low < 0.5, "low branch should be below 0.5, got {}", low);
        assert!(high > 0.5, "high branch should be above 0.5, got {}", high);
    }

    #[test]
    fn probability_is_bounded() {
        let m = ModelArtifact {
            base_score: 100.0,
            ..stump()
        };
        let p = m.predict_row(&[1.0, 0.0]).unwrap();
        assert!(p <= 1.0 && p > 0.99);
    }

    #[test]
    fn missing_features_read_as_zero() {
        let m = stump();
        // Row shorter than the split feature index: treated as 0.0 → low branch
        let p = m.predict_row(&[]).unwrap();
        assert!(p < 0.5);
    }

    #[test]
    fn empty_ensemble_is_base_score_only() {
        let m = ModelArtifact {
            model_info: "constant".into(),
            feature_names: None,
            base_score: 0.0,
            trees: vec![],
        };
        assert_eq!(m.predict_row(&[1.0, 2.0]).unwrap(), 0.5);
    }

    #[test]
    fn validate_rejects_out_of_range_children() {
        let mut m = stump();
        m.trees[0].nodes[0].left = 99;
        assert!(m.validate().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let raw = r#"{
            "model_info": "bid-success-gbdt v1",
            "feature_names": ["job_emb_0", "profile_experience_level"],
            "base_score": -0.2,
            "trees": [
                {"nodes": [
                    {"feature": 1, "threshold": 1.5, "left": 1, "right": 2},
                    {"feature": -1, "value": -0.7},
                    {"feature": -1, "value": 0.9}
                ]}
            ]
        }"#;
        let m: ModelArtifact = serde_json::from_str(raw).unwrap();
        assert!(m.validate().is_ok());
        assert_eq!(m.feature_names().unwrap().len(), 2);
        let p = m.predict_row(&[0.0, 2.0]).unwrap();
        assert!(p > 0.5);
    }
}
