use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use titanic_serve::config::{DEFAULT_CONFIG_PATH, ServiceConfig};
use titanic_serve::http_server::PredictServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  name = "titanic-serve",
  about = "HTTP API that predicts Titanic passenger survival with a registry-hosted model"
)]
struct Cli {
  /// Path to the YAML configuration file.
  #[arg(long, env = "TITANIC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
  config: PathBuf,

  /// Address to bind the HTTP server to (host:port); overrides the config file.
  #[arg(long, env = "TITANIC_BIND")]
  bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  let mut config = ServiceConfig::load(&cli.config)?;
  config.apply_env_overrides(|key| std::env::var(key).ok());

  let addr = match cli.bind {
    Some(addr) => addr,
    None => config.server.bind.parse()?,
  };
  info!(
    model = %config.model_uri(),
    tracking_uri = %config.tracking_uri,
    "starting prediction server"
  );

  PredictServer::from_config(&config)?.serve(addr).await?;
  Ok(())
}
