//! # Error Handling
//!
//! A single error type for the prediction pipeline, plus the one place where
//! those errors become HTTP responses.
//!
//! ## Error Kinds
//!
//! - **MalformedRequest**: body is not JSON, or not an array of objects
//! - **SchemaInvalid**: a required field is missing or has the wrong column type
//! - **RegistryUnavailable**: the model registry could not be reached (retryable)
//! - **ModelNotFound**: the configured name/stage resolves to no artifact
//! - **InvalidArtifact**: an artifact was fetched but is not a usable classifier
//! - **Prediction**: the loaded model rejected the feature matrix
//!
//! ## Status Mapping
//!
//! Schema failures keep the historical contract of a `200 OK` carrying an
//! `{"error": ...}` body. Everything else maps to a non-2xx status with an
//! additional `kind` field so callers can separate outages from
//! misconfiguration. See [`ServiceError::status_code`].

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while serving a prediction request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
  /// The request body is not valid JSON or not an array of objects.
  #[error("{0}")]
  MalformedRequest(String),
  /// The batch failed schema validation.
  #[error("{0}")]
  SchemaInvalid(String),
  /// The model registry could not be reached or answered with a server fault.
  #[error("model registry unavailable: {0}")]
  RegistryUnavailable(String),
  /// The configured model name/stage does not resolve to an artifact.
  #[error("model not found: {0}")]
  ModelNotFound(String),
  /// The fetched artifact could not be decoded into a classifier.
  #[error("invalid model artifact: {0}")]
  InvalidArtifact(String),
  /// The classifier refused the feature matrix.
  #[error("prediction failed: {0}")]
  Prediction(String),
}

impl ServiceError {
  /// Short machine-readable name, used as the `kind` field of error bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      ServiceError::MalformedRequest(_) => "malformed_request",
      ServiceError::SchemaInvalid(_) => "schema_invalid",
      ServiceError::RegistryUnavailable(_) => "registry_unavailable",
      ServiceError::ModelNotFound(_) => "model_not_found",
      ServiceError::InvalidArtifact(_) => "invalid_artifact",
      ServiceError::Prediction(_) => "prediction_failed",
    }
  }

  /// Whether retrying the same request later can succeed without operator action.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ServiceError::RegistryUnavailable(_))
  }

  /// The transport status for this error.
  ///
  /// Schema failures are deliberately `200 OK`: existing clients look for an
  /// `error` key in a successful response.
  pub fn status_code(&self) -> StatusCode {
    match self {
      ServiceError::SchemaInvalid(_) => StatusCode::OK,
      ServiceError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
      ServiceError::RegistryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ServiceError::ModelNotFound(_)
      | ServiceError::InvalidArtifact(_)
      | ServiceError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

/// JSON body for every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
  /// Human-readable reason.
  pub error: String,
  /// Error kind; omitted for schema failures to keep their legacy shape.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind: Option<&'static str>,
}

impl From<&ServiceError> for ErrorResponse {
  fn from(err: &ServiceError) -> Self {
    match err {
      ServiceError::SchemaInvalid(reason) => ErrorResponse {
        error: reason.clone(),
        kind: None,
      },
      other => ErrorResponse {
        error: other.to_string(),
        kind: Some(other.kind()),
      },
    }
  }
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
  }
}
