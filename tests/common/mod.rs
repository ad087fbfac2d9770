//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use titanic_serve::ServiceError;
use titanic_serve::http_server::{PredictServer, PredictServerConfig};
use titanic_serve::ml::{LoadedModel, ModelArtifact, ModelProvider, ModelRegistry, ModelUri};
use titanic_serve::service::PredictionService;

/// Logistic model that predicts survival for women only.
pub const SEX_MODEL: &str = r#"{
  "kind": "logistic",
  "features": ["Pclass", "Sex", "SibSp", "Parch", "Fare"],
  "coefficients": [0.0, 10.0, 0.0, 0.0, 0.0],
  "intercept": -5.0
}"#;

/// Registry that serves a fixed artifact, or a fixed error, and counts fetches.
pub struct FakeRegistry {
  artifact: Result<Vec<u8>, ServiceError>,
  fetches: AtomicUsize,
}

impl FakeRegistry {
  pub fn serving(artifact: &str) -> Arc<Self> {
    Arc::new(Self {
      artifact: Ok(artifact.as_bytes().to_vec()),
      fetches: AtomicUsize::new(0),
    })
  }

  pub fn failing(err: ServiceError) -> Arc<Self> {
    Arc::new(Self {
      artifact: Err(err),
      fetches: AtomicUsize::new(0),
    })
  }

  pub fn fetches(&self) -> usize {
    self.fetches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ModelRegistry for FakeRegistry {
  async fn fetch(&self, uri: &ModelUri) -> Result<LoadedModel, ServiceError> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    let bytes = self.artifact.clone()?;
    let classifier = ModelArtifact::from_slice(&bytes)?.into_classifier();
    Ok(LoadedModel::new(uri.clone(), Some("1".to_string()), classifier))
  }
}

pub fn server(registry: Arc<FakeRegistry>, config: PredictServerConfig, row_indices: bool) -> PredictServer {
  let provider = Arc::new(ModelProvider::new(
    registry,
    ModelUri::new("titanic", "staging"),
    Duration::from_secs(5),
  ));
  PredictServer::new(
    PredictionService::new(provider).with_row_indices(row_indices),
    config,
  )
}
