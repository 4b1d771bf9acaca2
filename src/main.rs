//! log-sink host service.
//!
//! ```text
//!   tracing macros ──▶ SinkLayer ──┐
//!                                  ├──▶ AsyncSink ──▶ worker thread ──▶ stdout / file
//!   HTTP requests ──▶ access_log ──┘        (bounded queue, drop on overflow)
//! ```
//!
//! Shutdown order: signal, stop accepting, drain connections, drain the sink.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use log_sink::config::{load_config, validate_config, ServiceConfig};
use log_sink::lifecycle::{wait_for_signal, Shutdown};
use log_sink::observability::{self, metrics};
use log_sink::sink::CloseOutcome;
use log_sink::HttpServer;

#[derive(Parser)]
#[command(name = "log-sink")]
#[command(about = "HTTP service logging through a non-blocking sink", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ServiceConfig::default();
            validate_config(&config).map_err(log_sink::config::ConfigError::Validation)?;
            config
        }
    };

    let guard = observability::init(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %config.logging.env,
        buffer_capacity = guard.sink().capacity(),
        "log-sink starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(err) = metrics::init_metrics(addr) {
                    tracing::error!(error = %err, "failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, guard.sink().clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let signal = wait_for_signal().await;
    tracing::info!(signal, "shutdown requested");
    shutdown.trigger();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "server exited with error"),
        Err(err) => tracing::error!(error = %err, "server task failed"),
    }

    tracing::info!("shutdown complete");
    if guard.shutdown() == CloseOutcome::TimedOut {
        std::process::exit(1);
    }
    Ok(())
}
