//! # Service Configuration
//!
//! The service reads a small YAML file naming the registered model and the
//! deployment stage to serve, plus optional tuning knobs.
//!
//! ```yaml
//! model_name: titanic-classifier
//! model_stage: staging
//! tracking_uri: https://mlflow.example.com
//! artifact_file: model.json
//! fetch_timeout_secs: 30
//! max_body_bytes: 1048576
//! include_row_indices: false
//! server:
//!   bind: 127.0.0.1:8000
//! ```
//!
//! `MLFLOW_TRACKING_URI` overrides `tracking_uri` when set.

use crate::ml::ModelUri;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config_mlflow/params.yml";

/// Environment variable that overrides the registry endpoint.
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The file could not be read.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  /// The file is not valid YAML or lacks a required key.
  #[error("yaml error: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Socket address to bind, `host:port`.
  pub bind: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: "127.0.0.1:8000".to_string(),
    }
  }
}

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
  /// Registered model name in the registry.
  pub model_name: String,
  /// Deployment stage to serve, e.g. `staging`.
  pub model_stage: String,
  /// Base URL of the registry's tracking server.
  #[serde(default = "default_tracking_uri")]
  pub tracking_uri: String,
  /// Artifact file holding the serialized classifier.
  #[serde(default = "default_artifact_file")]
  pub artifact_file: String,
  /// Upper bound on a single model load, in seconds.
  #[serde(default = "default_fetch_timeout_secs")]
  pub fetch_timeout_secs: u64,
  /// Largest accepted request body.
  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes: usize,
  /// Echo the source position of each prediction back to the caller.
  #[serde(default)]
  pub include_row_indices: bool,
  /// HTTP listener settings.
  #[serde(default)]
  pub server: ServerConfig,
}

fn default_tracking_uri() -> String {
  "http://127.0.0.1:5000".to_string()
}

fn default_artifact_file() -> String {
  "model.json".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
  30
}

fn default_max_body_bytes() -> usize {
  1024 * 1024
}

impl ServiceConfig {
  /// Creates a configuration with defaults for everything but the model address.
  pub fn new(model_name: impl Into<String>, model_stage: impl Into<String>) -> Self {
    Self {
      model_name: model_name.into(),
      model_stage: model_stage.into(),
      tracking_uri: default_tracking_uri(),
      artifact_file: default_artifact_file(),
      fetch_timeout_secs: default_fetch_timeout_secs(),
      max_body_bytes: default_max_body_bytes(),
      include_row_indices: false,
      server: ServerConfig::default(),
    }
  }

  /// Parses a configuration from YAML text.
  pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(s)?)
  }

  /// Loads a configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading configuration");
    let s = std::fs::read_to_string(path)?;
    Self::from_yaml_str(&s)
  }

  /// Applies environment overrides through `lookup`.
  ///
  /// Empty values are ignored.
  pub fn apply_env_overrides<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(uri) = lookup(TRACKING_URI_ENV).filter(|v| !v.trim().is_empty()) {
      debug!(tracking_uri = %uri, "tracking uri overridden from environment");
      self.tracking_uri = uri;
    }
  }

  /// Registry address of the configured model.
  pub fn model_uri(&self) -> ModelUri {
    ModelUri::new(self.model_name.clone(), self.model_stage.clone())
  }

  /// Timeout applied to a model load.
  pub fn fetch_timeout(&self) -> Duration {
    Duration::from_secs(self.fetch_timeout_secs)
  }
}
