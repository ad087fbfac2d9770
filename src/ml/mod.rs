//! # Machine Learning Module
//!
//! Everything between a feature matrix and a prediction: the opaque
//! [`Classifier`] contract and its serialized artifacts, the registry client
//! that fetches them, and the [`ModelProvider`] that caches the served model.

pub mod model;
pub mod provider;
pub mod registry;

pub use model::{
  Classifier, DecisionForest, DecisionTree, Label, LoadedModel, LogisticRegression, ModelArtifact,
  TreeNode,
};
pub use provider::ModelProvider;
pub use registry::{MlflowRegistry, ModelRegistry, ModelUri};

#[cfg(test)]
mod provider_test;
