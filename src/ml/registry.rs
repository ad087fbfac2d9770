//! # Model Registry Client
//!
//! Resolves a `models:/<name>/<stage>` address to a [`LoadedModel`] over the
//! MLflow tracking server's REST API.
//!
//! ## Resolution
//!
//! 1. `registered-models/get-latest-versions` finds the version currently in
//!    the stage.
//! 2. `model-versions/get-download-uri` gives that version's artifact root.
//! 3. The artifact file is downloaded through the tracking server's
//!    `mlflow-artifacts` proxy and decoded as a [`ModelArtifact`].
//!
//! Connection failures, timeouts, auth refusals and server faults are reported
//! as [`ServiceError::RegistryUnavailable`]. An unknown name, an empty stage or
//! an artifact location the tracking server does not proxy is reported as
//! [`ServiceError::ModelNotFound`].

use crate::error::ServiceError;
use crate::ml::model::{LoadedModel, ModelArtifact};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Registry address of a model: a registered name and a deployment stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelUri {
  /// Registered model name.
  pub name: String,
  /// Deployment stage, e.g. `staging` or `production`.
  pub stage: String,
}

impl ModelUri {
  /// Creates a new address.
  pub fn new(name: impl Into<String>, stage: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      stage: stage.into(),
    }
  }
}

impl fmt::Display for ModelUri {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "models:/{}/{}", self.name, self.stage)
  }
}

/// A source of trained models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
  /// Fetches and decodes the model addressed by `uri`.
  async fn fetch(&self, uri: &ModelUri) -> Result<LoadedModel, ServiceError>;
}

const ARTIFACT_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
pub(crate) struct LatestVersionsResponse {
  #[serde(default)]
  pub(crate) model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelVersion {
  pub(crate) version: String,
  #[serde(default)]
  pub(crate) current_stage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadUriResponse {
  pub(crate) artifact_uri: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegistryErrorBody {
  #[serde(default)]
  pub(crate) error_code: Option<String>,
  #[serde(default)]
  pub(crate) message: Option<String>,
}

/// Picks the newest version from a `get-latest-versions` answer.
pub(crate) fn select_version(
  uri: &ModelUri,
  response: LatestVersionsResponse,
) -> Result<ModelVersion, ServiceError> {
  response
    .model_versions
    .into_iter()
    .filter(|v| {
      v.current_stage
        .as_deref()
        .is_none_or(|stage| stage.eq_ignore_ascii_case(&uri.stage))
    })
    .max_by_key(|v| v.version.parse::<u64>().unwrap_or(0))
    .ok_or_else(|| ServiceError::ModelNotFound(format!("no version of {} is in that stage", uri)))
}

/// Maps an artifact root plus file name onto the tracking server's artifact proxy.
pub(crate) fn artifact_download_url(
  tracking_uri: &str,
  artifact_uri: &str,
  artifact_file: &str,
) -> Result<String, ServiceError> {
  let path = artifact_uri.strip_prefix(ARTIFACT_SCHEME).ok_or_else(|| {
    ServiceError::ModelNotFound(format!(
      "artifact location {} is not served by the registry",
      artifact_uri
    ))
  })?;
  Ok(format!(
    "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}",
    tracking_uri.trim_end_matches('/'),
    path.trim_matches('/'),
    artifact_file.trim_start_matches('/')
  ))
}

/// Classifies a non-success registry answer.
pub(crate) fn classify_failure(uri: &ModelUri, status: StatusCode, body: &str) -> ServiceError {
  let parsed: Option<RegistryErrorBody> = serde_json::from_str(body).ok();
  let code = parsed.as_ref().and_then(|b| b.error_code.as_deref());
  let message = parsed
    .as_ref()
    .and_then(|b| b.message.clone())
    .unwrap_or_else(|| body.to_string());

  if status == StatusCode::NOT_FOUND || code == Some("RESOURCE_DOES_NOT_EXIST") {
    ServiceError::ModelNotFound(format!("{}: {}", uri, message))
  } else {
    ServiceError::RegistryUnavailable(format!("{} ({}): {}", uri, status, message))
  }
}

/// MLflow tracking server client.
#[derive(Debug, Clone)]
pub struct MlflowRegistry {
  client: Client,
  tracking_uri: String,
  artifact_file: String,
}

impl MlflowRegistry {
  /// Creates a client for the tracking server at `tracking_uri`.
  ///
  /// `artifact_file` names the serialized classifier inside each model's
  /// artifact directory.
  pub fn new(
    tracking_uri: impl Into<String>,
    artifact_file: impl Into<String>,
    timeout: Duration,
  ) -> Result<Self, ServiceError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ServiceError::RegistryUnavailable(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self {
      client,
      tracking_uri: tracking_uri.into().trim_end_matches('/').to_string(),
      artifact_file: artifact_file.into(),
    })
  }

  fn api_url(&self, endpoint: &str) -> String {
    format!("{}/api/2.0/mlflow/{}", self.tracking_uri, endpoint)
  }

  async fn get(
    &self,
    uri: &ModelUri,
    url: &str,
    query: &[(&str, &str)],
  ) -> Result<reqwest::Response, ServiceError> {
    trace!(url = %url, "registry request");
    let response = self
      .client
      .get(url)
      .query(query)
      .send()
      .await
      .map_err(|e| ServiceError::RegistryUnavailable(format!("{}: {}", uri, e)))?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response
      .text()
      .await
      .unwrap_or_else(|_| "<body unavailable>".to_string());
    let err = classify_failure(uri, status, &body);
    warn!(status = %status, error = %err, "registry request failed");
    Err(err)
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    uri: &ModelUri,
    url: &str,
    query: &[(&str, &str)],
  ) -> Result<T, ServiceError> {
    self
      .get(uri, url, query)
      .await?
      .json()
      .await
      .map_err(|e| ServiceError::RegistryUnavailable(format!("{}: unreadable response: {}", uri, e)))
  }
}

#[async_trait]
impl ModelRegistry for MlflowRegistry {
  async fn fetch(&self, uri: &ModelUri) -> Result<LoadedModel, ServiceError> {
    debug!(model = %uri, tracking_uri = %self.tracking_uri, "resolving model");

    let latest: LatestVersionsResponse = self
      .get_json(
        uri,
        &self.api_url("registered-models/get-latest-versions"),
        &[("name", uri.name.as_str()), ("stages", uri.stage.as_str())],
      )
      .await?;
    let version = select_version(uri, latest)?;

    let download: DownloadUriResponse = self
      .get_json(
        uri,
        &self.api_url("model-versions/get-download-uri"),
        &[("name", uri.name.as_str()), ("version", version.version.as_str())],
      )
      .await?;
    let url = artifact_download_url(&self.tracking_uri, &download.artifact_uri, &self.artifact_file)?;

    let bytes = self
      .get(uri, &url, &[])
      .await?
      .bytes()
      .await
      .map_err(|e| ServiceError::RegistryUnavailable(format!("{}: {}", uri, e)))?;
    let classifier = ModelArtifact::from_slice(&bytes)?.into_classifier();

    info!(model = %uri, version = %version.version, "model fetched from registry");
    Ok(LoadedModel::new(uri.clone(), Some(version.version), classifier))
  }
}
