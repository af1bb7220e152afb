//! Model artifact format and the estimators it can carry.
//!
//! An artifact is a JSON document holding the feature schema, an optional standard scaler and
//! one estimator (logistic regression or a forest of binary trees). It is validated once on
//! load so `predict` only has to check the input width.

use serde::{Deserialize, Serialize};

use crate::error::PredictError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub estimator: Estimator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    Forest { trees: Vec<Tree> },
}

fn default_threshold() -> f64 { 0.5 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// `x[feature] <= threshold` goes left.
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    /// Probability of the positive class.
    Leaf { proba: f64 },
}

impl ModelArtifact {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes).map_err(|e| format!("invalid artifact json: {e}"))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn n_features(&self) -> usize { self.feature_names.len() }

    fn validate(&self) -> Result<(), String> {
        let n = self.n_features();
        if n == 0 { return Err("artifact declares no features".into()); }
        if let Some(s) = &self.scaler {
            if s.mean.len() != n || s.scale.len() != n {
                return Err(format!("scaler has {}/{} entries for {n} features", s.mean.len(), s.scale.len()));
            }
        }
        match &self.estimator {
            Estimator::Logistic { coefficients, .. } => {
                if coefficients.len() != n { return Err(format!("{} coefficients for {n} features", coefficients.len())); }
            }
            Estimator::Forest { trees } => {
                if trees.is_empty() { return Err("forest has no trees".into()); }
                for (t, tree) in trees.iter().enumerate() { tree.validate(n).map_err(|e| format!("tree {t}: {e}"))?; }
            }
        }
        Ok(())
    }

    /// Fails unless the artifact was trained on exactly `columns`, in order.
    pub fn check_schema(&self, columns: &[&str]) -> Result<(), PredictError> {
        if self.feature_names.iter().map(String::as_str).eq(columns.iter().copied()) { return Ok(()); }
        Err(PredictError::SchemaMismatch(format!(
            "model expects [{}], request provides [{}]",
            self.feature_names.join(", "),
            columns.join(", ")
        )))
    }

    /// One label per input row (`1` positive, `0` negative).
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i64>, PredictError> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    fn predict_row(&self, row: &[f64]) -> Result<i64, PredictError> {
        if row.len() != self.n_features() {
            return Err(PredictError::Inference(format!("row has {} values, model expects {}", row.len(), self.n_features())));
        }
        let x = match &self.scaler { Some(s) => s.transform(row), None => row.to_vec() };
        let positive = match &self.estimator {
            Estimator::Logistic { coefficients, intercept, threshold } => {
                let z = coefficients.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>() + intercept;
                sigmoid(z) > *threshold
            }
            Estimator::Forest { trees } => {
                let sum: f64 = trees.iter().map(|t| t.proba(&x)).sum();
                sum / trees.len() as f64 > 0.5
            }
        };
        Ok(positive as i64)
    }
}

impl StandardScaler {
    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
            .collect()
    }
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() { return Err("no nodes".into()); }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, .. } = node {
                if *feature >= n_features { return Err(format!("node {i} splits on feature {feature} of {n_features}")); }
                // children strictly after the parent, so traversal always terminates
                for child in [*left, *right] {
                    if child <= i || child >= len { return Err(format!("node {i} has invalid child {child}")); }
                }
            }
        }
        Ok(())
    }

    fn proba(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split { feature, threshold, left, right } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 { 1.0 / (1.0 + (-z).exp()) }
