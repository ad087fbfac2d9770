//! # Prediction Service
//!
//! Orchestrates a single prediction request:
//!
//! 1. parse the body into a batch of records,
//! 2. validate the batch against the passenger schema,
//! 3. transform it into a feature matrix,
//! 4. obtain the served model (loading it on first use),
//! 5. score the matrix and shape the response.
//!
//! Every failure comes back as a [`ServiceError`]; turning those into HTTP
//! responses is left to the transport layer.

use crate::error::ServiceError;
use crate::features::{self, FeatureMatrix};
use crate::ml::{Label, ModelProvider};
use crate::schema::{self, Record, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Successful prediction payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
  /// One label per surviving row, in batch order.
  pub predictions: Vec<Label>,
  /// Source position of each prediction, when enabled.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub row_indices: Option<Vec<usize>>,
}

/// Decodes a request body into a batch.
///
/// The body must be a JSON array whose elements are all objects.
pub fn parse_batch(raw: &[u8]) -> Result<Vec<Record>, ServiceError> {
  let value: Value = serde_json::from_slice(raw)
    .map_err(|_| ServiceError::MalformedRequest("invalid JSON".to_string()))?;
  let Value::Array(items) = value else {
    return Err(ServiceError::MalformedRequest(
      "expected a JSON array of objects".to_string(),
    ));
  };
  items
    .into_iter()
    .map(|item| match item {
      Value::Object(record) => Ok(record),
      _ => Err(ServiceError::MalformedRequest(
        "expected a JSON array of objects".to_string(),
      )),
    })
    .collect()
}

/// The request-handling pipeline, shared by all in-flight requests.
#[derive(Clone)]
pub struct PredictionService {
  provider: Arc<ModelProvider>,
  include_row_indices: bool,
}

impl PredictionService {
  /// Creates a service scoring with the model held by `provider`.
  pub fn new(provider: Arc<ModelProvider>) -> Self {
    Self {
      provider,
      include_row_indices: false,
    }
  }

  /// Echo source row positions alongside predictions.
  pub fn with_row_indices(mut self, enabled: bool) -> Self {
    self.include_row_indices = enabled;
    self
  }

  /// The model provider backing this service.
  pub fn provider(&self) -> &Arc<ModelProvider> {
    &self.provider
  }

  /// Runs the full pipeline on a raw request body.
  pub async fn predict(&self, raw: &[u8]) -> Result<PredictionResponse, ServiceError> {
    trace!(bytes = raw.len(), "PredictionService::predict");
    let batch = parse_batch(raw)?;
    self.predict_batch(&batch).await
  }

  /// Runs validation, transformation and scoring on a decoded batch.
  pub async fn predict_batch(&self, batch: &[Record]) -> Result<PredictionResponse, ServiceError> {
    if let ValidationResult::Invalid(reason) = schema::validate(batch) {
      warn!(reason = %reason, records = batch.len(), "batch rejected");
      return Err(ServiceError::SchemaInvalid(reason));
    }

    let matrix = features::transform(batch);
    debug!(records = batch.len(), rows = matrix.len(), "batch transformed");

    let model = self.provider.get_model().await?;
    let predictions = model.predict(&matrix)?;
    if predictions.len() != matrix.len() {
      return Err(ServiceError::Prediction(format!(
        "model returned {} labels for {} rows",
        predictions.len(),
        matrix.len()
      )));
    }

    Ok(self.respond(predictions, &matrix))
  }

  fn respond(&self, predictions: Vec<Label>, matrix: &FeatureMatrix) -> PredictionResponse {
    PredictionResponse {
      predictions,
      row_indices: self.include_row_indices.then(|| matrix.row_indices()),
    }
  }
}
