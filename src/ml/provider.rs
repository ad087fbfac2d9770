//! # Model Provider
//!
//! Holds the one model this process serves. The model is fetched lazily on the
//! first request and then reused for the lifetime of the process.
//!
//! Loading is single-flight: while a fetch is in progress every other caller
//! waits for it and receives the same `Arc`. A failed fetch leaves the provider
//! empty so a later request can try again. There is no invalidation; a new
//! version promoted to the stage is only picked up after a restart.

use crate::error::ServiceError;
use crate::ml::model::LoadedModel;
use crate::ml::registry::{ModelRegistry, ModelUri};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, trace};

/// Process-scoped holder of the served model.
pub struct ModelProvider {
  registry: Arc<dyn ModelRegistry>,
  uri: ModelUri,
  fetch_timeout: Duration,
  model: OnceCell<Arc<LoadedModel>>,
}

impl ModelProvider {
  /// Creates an empty provider for the model at `uri`.
  pub fn new(registry: Arc<dyn ModelRegistry>, uri: ModelUri, fetch_timeout: Duration) -> Self {
    Self {
      registry,
      uri,
      fetch_timeout,
      model: OnceCell::new(),
    }
  }

  /// The registry address this provider serves.
  pub fn uri(&self) -> &ModelUri {
    &self.uri
  }

  /// Whether a model has been loaded.
  pub fn is_loaded(&self) -> bool {
    self.model.initialized()
  }

  /// Returns the cached model, fetching it on first use.
  ///
  /// # Errors
  ///
  /// [`ServiceError::RegistryUnavailable`] when the registry cannot be reached
  /// or the fetch exceeds the configured timeout, and whatever the registry
  /// reports for an unknown or undecodable model.
  pub async fn get_model(&self) -> Result<Arc<LoadedModel>, ServiceError> {
    self
      .model
      .get_or_try_init(|| self.load())
      .await
      .map(Arc::clone)
  }

  async fn load(&self) -> Result<Arc<LoadedModel>, ServiceError> {
    trace!(model = %self.uri, "ModelProvider::load");
    let fetched = tokio::time::timeout(self.fetch_timeout, self.registry.fetch(&self.uri)).await;
    match fetched {
      Ok(Ok(model)) => {
        info!(
          model = %self.uri,
          version = model.version.as_deref().unwrap_or("unknown"),
          loaded_at = %model.loaded_at,
          "model loaded"
        );
        Ok(Arc::new(model))
      }
      Ok(Err(err)) => {
        error!(model = %self.uri, error = %err, retryable = err.is_retryable(), "model load failed");
        Err(err)
      }
      Err(_) => {
        error!(model = %self.uri, timeout = ?self.fetch_timeout, "model load timed out");
        Err(ServiceError::RegistryUnavailable(format!(
          "{}: fetch timed out after {:?}",
          self.uri, self.fetch_timeout
        )))
      }
    }
  }
}
