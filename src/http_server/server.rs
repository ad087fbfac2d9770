//! # Prediction Server
//!
//! Wires the prediction service into an Axum router and runs it.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::http_server::handler::predict_handler;
use crate::ml::{MlflowRegistry, ModelProvider};
use crate::service::PredictionService;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, trace, warn};

/// Transport settings for [`PredictServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictServerConfig {
  /// Largest accepted request body in bytes (default: 1 MiB).
  pub max_body_bytes: usize,
}

impl Default for PredictServerConfig {
  fn default() -> Self {
    Self {
      max_body_bytes: 1024 * 1024,
    }
  }
}

/// HTTP front end of the prediction service.
pub struct PredictServer {
  service: PredictionService,
  config: PredictServerConfig,
}

impl PredictServer {
  /// Creates a server around an existing service.
  pub fn new(service: PredictionService, config: PredictServerConfig) -> Self {
    Self { service, config }
  }

  /// Builds the registry client, model provider and service described by `config`.
  ///
  /// The model itself is not fetched here; the first request triggers the load.
  pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
    trace!(model = %config.model_uri(), tracking_uri = %config.tracking_uri, "PredictServer::from_config");
    let registry = MlflowRegistry::new(
      &config.tracking_uri,
      &config.artifact_file,
      config.fetch_timeout(),
    )?;
    let provider = Arc::new(ModelProvider::new(
      Arc::new(registry),
      config.model_uri(),
      config.fetch_timeout(),
    ));
    let service = PredictionService::new(provider).with_row_indices(config.include_row_indices);
    Ok(Self::new(
      service,
      PredictServerConfig {
        max_body_bytes: config.max_body_bytes,
      },
    ))
  }

  /// The service behind the routes.
  pub fn service(&self) -> &PredictionService {
    &self.service
  }

  /// Builds the Axum router.
  pub fn router(&self) -> Router {
    Router::new()
      .route("/predict", post(predict_handler))
      .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
      .layer(CorsLayer::permissive())
      .layer(TraceLayer::new_for_http())
      .with_state(self.service.clone())
  }

  /// Binds `addr` and serves until Ctrl-C.
  pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    self.serve_on(listener).await
  }

  /// Serves on an already bound listener until Ctrl-C.
  pub async fn serve_on(self, listener: TcpListener) -> std::io::Result<()> {
    info!(
      addr = %listener.local_addr()?,
      model = %self.service.provider().uri(),
      "prediction server listening"
    );
    axum::serve(listener, self.router())
      .with_graceful_shutdown(shutdown_signal())
      .await
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}
