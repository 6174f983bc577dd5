//! Random forest classifier loaded from a JSON export.
//!
//! Artifact layout:
//!
//! ```json
//! {
//!   "classes": ["AI", "HUMAN"],
//!   "n_features": 13,
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": -250.0, "left": 1, "right": 2 },
//!         { "value": [12.0, 3.0] },
//!         { "value": [1.0, 20.0] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Node 0 is the root. A split sends the sample left when
//! `x[feature] <= threshold`. Leaf values are per-class sample weights and
//! are normalised before averaging across trees.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::model::{read_artifact, VoiceClassifier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f32>,
    },
}

impl RandomForest {
    /// Loads and validates a forest from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let forest = Self::from_json(&read_artifact(path)?)?;
        debug!(
            path = %path.display(),
            trees = forest.trees.len(),
            classes = ?forest.classes,
            "forest: artifact loaded"
        );
        Ok(forest)
    }

    /// Parses and validates a forest from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let forest: Self = serde_json::from_str(json)?;
        forest.validate()?;
        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.classes.is_empty() {
            return Err(ModelError::Invalid("forest has no classes".into()));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.classes.len(), self.n_features)
                .map_err(|msg| ModelError::Invalid(format!("tree {t}: {msg}")))?;
        }
        Ok(())
    }
}

impl Tree {
    /// Checks indices, leaf widths, and that every node is reachable at most
    /// once from the root (no cycles, no shared children).
    fn validate(&self, n_classes: usize, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".into());
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if seen[i] {
                return Err(format!("node {i} reached twice"));
            }
            seen[i] = true;
            match &self.nodes[i] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {i}: feature {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i}: non-finite threshold"));
                    }
                    for &child in [left, right] {
                        if child >= self.nodes.len() {
                            return Err(format!("node {i}: child {child} out of range"));
                        }
                        stack.push(child);
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(format!(
                            "node {i}: leaf has {} values, expected {n_classes}",
                            value.len()
                        ));
                    }
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                        return Err(format!("node {i}: leaf values must be finite and non-negative"));
                    }
                    if value.iter().sum::<f32>() <= 0.0 {
                        return Err(format!("node {i}: leaf is empty"));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf(&self, x: &[f32]) -> &[f32] {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

impl VoiceClassifier for RandomForest {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::Input(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Input("features must be finite".into()));
        }

        let mut acc = vec![0.0f64; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(features);
            let total: f64 = leaf.iter().map(|&v| v as f64).sum();
            for (a, &v) in acc.iter_mut().zip(leaf) {
                *a += v as f64 / total;
            }
        }
        let n = self.trees.len() as f64;
        Ok(acc.into_iter().map(|a| (a / n) as f32).collect())
    }
}
