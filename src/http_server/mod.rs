//! # HTTP Server
//!
//! Exposes the prediction pipeline over HTTP with Axum.
//!
//! ## Routes
//!
//! - `POST /predict`: JSON array of passenger records in, predictions out
//!
//! All origins, methods and headers are allowed (permissive CORS). Request
//! bodies above the configured limit are refused with `413`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use titanic_serve::config::ServiceConfig;
//! use titanic_serve::http_server::PredictServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::new("titanic", "staging");
//! let server = PredictServer::from_config(&config)?;
//! server.serve("127.0.0.1:8000".parse()?).await?;
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod server;

pub use handler::predict_handler;
pub use server::{PredictServer, PredictServerConfig};
