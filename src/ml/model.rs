//! # Model Artifacts
//!
//! The classifier is opaque to the rest of the service: it takes a
//! [`FeatureMatrix`] and returns one label per row, in row order.
//!
//! Artifacts are stored in the registry as JSON documents tagged by `kind`:
//!
//! ```json
//! {"kind": "logistic",
//!  "features": ["Pclass", "Sex", "SibSp", "Parch", "Fare"],
//!  "coefficients": [-0.9, 2.6, -0.3, -0.1, 0.003],
//!  "intercept": 0.8}
//! ```
//!
//! ```json
//! {"kind": "forest",
//!  "features": ["Pclass", "Sex", "SibSp", "Parch", "Fare"],
//!  "trees": [{"nodes": [
//!    {"feature": 1, "threshold": 0.5, "left": 1, "right": 2},
//!    {"label": 0},
//!    {"label": 1}]}]}
//! ```
//!
//! Split nodes send a row left when its feature value is `<=` the threshold.

use crate::error::ServiceError;
use crate::features::{FEATURE_COLUMNS, FeatureMatrix};
use crate::ml::ModelUri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A predicted class.
pub type Label = i64;

/// Contract of a loaded model.
pub trait Classifier: fmt::Debug + Send + Sync {
  /// Column names the model was trained on, in feature order.
  fn input_columns(&self) -> &[String];

  /// Predicts one label per row of `features`.
  fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, ServiceError>;
}

fn check_width(model: &dyn Classifier, features: &FeatureMatrix) -> Result<(), ServiceError> {
  let expected = model.input_columns().len();
  if features.width() != expected {
    return Err(ServiceError::Prediction(format!(
      "model expects {} columns, got {}",
      expected,
      features.width()
    )));
  }
  Ok(())
}

fn check_columns(columns: &[String]) -> Result<(), ServiceError> {
  if columns.iter().map(String::as_str).ne(FEATURE_COLUMNS.iter().copied()) {
    return Err(ServiceError::InvalidArtifact(format!(
      "artifact features {:?} do not match {:?}",
      columns, FEATURE_COLUMNS
    )));
  }
  Ok(())
}

fn default_threshold() -> f64 {
  0.5
}

/// Binary logistic regression.
///
/// Built through [`LogisticRegression::new`] or decoded from an artifact; both
/// paths check the column list and coefficient count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
  features: Vec<String>,
  coefficients: Vec<f64>,
  intercept: f64,
  #[serde(default = "default_threshold")]
  threshold: f64,
}

impl LogisticRegression {
  /// Creates a model with one coefficient per feature column.
  ///
  /// `threshold` is the probability at or above which a row is labelled `1`.
  pub fn new(
    features: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
    threshold: f64,
  ) -> Result<Self, ServiceError> {
    let model = Self {
      features,
      coefficients,
      intercept,
      threshold,
    };
    model.check()?;
    Ok(model)
  }

  fn check(&self) -> Result<(), ServiceError> {
    check_columns(&self.features)?;
    if self.coefficients.len() != self.features.len() {
      return Err(ServiceError::InvalidArtifact(format!(
        "{} coefficients for {} features",
        self.coefficients.len(),
        self.features.len()
      )));
    }
    Ok(())
  }

  /// Decision threshold.
  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  /// Survival probability for a single row.
  pub fn probability(&self, values: &[f64]) -> Result<f64, ServiceError> {
    if values.len() != self.coefficients.len() {
      return Err(ServiceError::Prediction(format!(
        "{} values for {} coefficients",
        values.len(),
        self.coefficients.len()
      )));
    }
    let z: f64 = self
      .coefficients
      .iter()
      .zip(values)
      .map(|(w, x)| w * x)
      .sum::<f64>()
      + self.intercept;
    Ok(1.0 / (1.0 + (-z).exp()))
  }
}

impl Classifier for LogisticRegression {
  fn input_columns(&self) -> &[String] {
    &self.features
  }

  fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, ServiceError> {
    check_width(self, features)?;
    features
      .rows()
      .iter()
      .map(|row| Ok(Label::from(self.probability(&row.values)? >= self.threshold)))
      .collect()
  }
}

/// A node of a [`DecisionTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
  /// Internal node.
  Split {
    /// Feature column compared at this node.
    feature: usize,
    /// Values `<=` this go left.
    threshold: f64,
    /// Index of the left child.
    left: usize,
    /// Index of the right child.
    right: usize,
  },
  /// Terminal node.
  Leaf {
    /// Label emitted for rows reaching this leaf.
    label: Label,
  },
}

/// A decision tree stored as a flat node array rooted at index 0.
///
/// Children always come after their parent. The layout is checked when the
/// tree joins a [`DecisionForest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
  nodes: Vec<TreeNode>,
}

impl DecisionTree {
  /// Wraps a flat node array.
  pub fn new(nodes: Vec<TreeNode>) -> Self {
    Self { nodes }
  }

  fn check(&self, width: usize) -> Result<(), ServiceError> {
    if self.nodes.is_empty() {
      return Err(ServiceError::InvalidArtifact("tree has no nodes".to_string()));
    }
    for (index, node) in self.nodes.iter().enumerate() {
      if let TreeNode::Split {
        feature,
        left,
        right,
        ..
      } = node
      {
        if *feature >= width {
          return Err(ServiceError::InvalidArtifact(format!(
            "node {} splits on feature {} of {}",
            index, feature, width
          )));
        }
        for child in [*left, *right] {
          if child <= index || child >= self.nodes.len() {
            return Err(ServiceError::InvalidArtifact(format!(
              "node {} has invalid child {}",
              index, child
            )));
          }
        }
      }
    }
    Ok(())
  }

  /// Walks the tree for one row.
  ///
  /// A dangling node or feature reference is a [`ServiceError::Prediction`].
  pub fn predict_row(&self, values: &[f64]) -> Result<Label, ServiceError> {
    let mut index = 0;
    // a well-formed walk visits each node at most once
    for _ in 0..=self.nodes.len() {
      let node = self.nodes.get(index).ok_or_else(|| {
        ServiceError::Prediction(format!("tree references missing node {}", index))
      })?;
      match node {
        TreeNode::Leaf { label } => return Ok(*label),
        TreeNode::Split {
          feature,
          threshold,
          left,
          right,
        } => {
          let value = values.get(*feature).ok_or_else(|| {
            ServiceError::Prediction(format!("tree splits on missing feature {}", feature))
          })?;
          index = if *value <= *threshold { *left } else { *right };
        }
      }
    }
    Err(ServiceError::Prediction("tree walk does not terminate".to_string()))
  }
}

/// Majority vote over decision trees. Ties go to the smallest label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionForest {
  features: Vec<String>,
  trees: Vec<DecisionTree>,
}

impl DecisionForest {
  /// Creates a forest over the model columns, checking every tree.
  pub fn new(features: Vec<String>, trees: Vec<DecisionTree>) -> Result<Self, ServiceError> {
    let forest = Self { features, trees };
    forest.check()?;
    Ok(forest)
  }

  fn check(&self) -> Result<(), ServiceError> {
    check_columns(&self.features)?;
    if self.trees.is_empty() {
      return Err(ServiceError::InvalidArtifact("forest has no trees".to_string()));
    }
    self
      .trees
      .iter()
      .try_for_each(|tree| tree.check(self.features.len()))
  }

  fn vote(&self, values: &[f64]) -> Result<Label, ServiceError> {
    let mut votes: BTreeMap<Label, usize> = BTreeMap::new();
    for tree in &self.trees {
      *votes.entry(tree.predict_row(values)?).or_default() += 1;
    }
    let mut best = (0, 0);
    for (label, count) in votes {
      if count > best.1 {
        best = (label, count);
      }
    }
    Ok(best.0)
  }
}

impl Classifier for DecisionForest {
  fn input_columns(&self) -> &[String] {
    &self.features
  }

  fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, ServiceError> {
    check_width(self, features)?;
    features
      .rows()
      .iter()
      .map(|row| self.vote(&row.values))
      .collect()
  }
}

/// Serialized model as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
  /// Logistic regression.
  Logistic(LogisticRegression),
  /// Decision tree ensemble.
  Forest(DecisionForest),
}

impl ModelArtifact {
  /// Decodes and checks an artifact document.
  pub fn from_slice(bytes: &[u8]) -> Result<Self, ServiceError> {
    let artifact: ModelArtifact =
      serde_json::from_slice(bytes).map_err(|e| ServiceError::InvalidArtifact(e.to_string()))?;
    match &artifact {
      ModelArtifact::Logistic(model) => model.check()?,
      ModelArtifact::Forest(model) => model.check()?,
    }
    Ok(artifact)
  }

  /// Converts the artifact into a ready classifier.
  pub fn into_classifier(self) -> Box<dyn Classifier> {
    match self {
      ModelArtifact::Logistic(model) => Box::new(model),
      ModelArtifact::Forest(model) => Box::new(model),
    }
  }
}

/// A classifier fetched from the registry, together with where it came from.
#[derive(Debug)]
pub struct LoadedModel {
  /// Registry address the model was resolved from.
  pub uri: ModelUri,
  /// Registry version, when the registry reports one.
  pub version: Option<String>,
  /// When the artifact finished loading.
  pub loaded_at: DateTime<Utc>,
  classifier: Box<dyn Classifier>,
}

impl LoadedModel {
  /// Wraps a classifier resolved from `uri`.
  pub fn new(uri: ModelUri, version: Option<String>, classifier: Box<dyn Classifier>) -> Self {
    Self {
      uri,
      version,
      loaded_at: Utc::now(),
      classifier,
    }
  }

  /// Predicts one label per row of `features`.
  pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Label>, ServiceError> {
    self.classifier.predict(features)
  }
}
