//! # Route Handlers

use crate::error::ServiceError;
use crate::service::{PredictionResponse, PredictionService};
use axum::Json;
use axum::extract::State;
use bytes::Bytes;
use tracing::debug;

/// `POST /predict`.
///
/// The body is taken as raw bytes so that undecodable payloads are reported
/// by the service itself rather than by an extractor rejection.
pub async fn predict_handler(
  State(service): State<PredictionService>,
  body: Bytes,
) -> Result<Json<PredictionResponse>, ServiceError> {
  let response = service.predict(&body).await?;
  debug!(predictions = response.predictions.len(), "prediction served");
  Ok(Json(response))
}
