#![forbid(unsafe_code)]

use anyhow::Context;
use esp_ota_server::config::{Config, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("espotad: {err}");
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        // Request logs are emitted from tracing spans in `http::observability`.
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let server_config = match config.validate() {
        Ok(server_config) => server_config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };
    tracing::info!(path = %server_config.data_dir.path().display(), "Data-dir");

    let server = esp_ota_server::start(server_config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("install Ctrl-C handler")?;
    tracing::info!("shutting down");
    server.shutdown().await
}
