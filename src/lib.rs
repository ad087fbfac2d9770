//! # Titanic Serve
//!
//! HTTP inference service that predicts Titanic passenger survival with a
//! classifier fetched from an MLflow model registry.
//!
//! ## Request Flow
//!
//! ```text
//! POST /predict ──► parse ──► schema::validate ──► features::transform
//!                                                         │
//!                     response ◄── model.predict ◄── ModelProvider::get_model
//! ```
//!
//! - [`schema`] checks the batch column by column against a fixed schema.
//! - [`features`] projects, encodes and drops incomplete rows.
//! - [`ml`] holds the classifier contract, the registry client and the
//!   process-wide model cache.
//! - [`service`] runs the pipeline; [`http_server`] exposes it.
//! - [`error`] is the one place errors become HTTP statuses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use titanic_serve::config::ServiceConfig;
//! use titanic_serve::http_server::PredictServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::load("config_mlflow/params.yml".as_ref())?;
//! PredictServer::from_config(&config)?
//!   .serve(config.server.bind.parse()?)
//!   .await?;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Service configuration loading.
pub mod config;
/// Error taxonomy and HTTP status mapping.
pub mod error;
/// Feature projection and encoding.
pub mod features;
/// HTTP routes and server.
pub mod http_server;
/// Classifier contract, registry client and model cache.
pub mod ml;
/// Batch schema validation.
pub mod schema;
/// Prediction request pipeline.
pub mod service;

pub use error::ServiceError;
pub use service::{PredictionResponse, PredictionService};
