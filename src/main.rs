//! SOAP bridge
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   SOAP BRIDGE                    │
//!     SOAP client        │  ┌─────────┐   ┌──────────┐   ┌───────────────┐  │
//!     ───────────────────┼─▶│  http   │──▶│   soap   │──▶│   upstream    │──┼──▶ Registry
//!                        │  │ server  │   │ envelope │   │ HTTPS client  │  │    (TLS)
//!                        │  │ + WSDL  │   │ + names  │   │ + pool        │  │
//!     ◀──────────────────┼──│         │◀──│          │◀──│               │◀─┼───
//!                        │  └─────────┘   └──────────┘   └───────────────┘  │
//!                        │                                                  │
//!                        │  config · observability · lifecycle              │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use soap_bridge::config::ProxyConfig;
use soap_bridge::http::HttpServer;
use soap_bridge::lifecycle::{signals, startup, Shutdown};
use soap_bridge::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "soap-bridge", version, about = "SOAP operation-renaming bridge")]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long, env = "SOAP_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match startup::resolve_config(cli.config.as_deref(), cli.bind) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the file, so it is not up yet.
            eprintln!("soap-bridge: {e}");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "soap-bridge starting");
    log_config(&config);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::from_config(config.clone())
        .map_err(startup::StartupError::from)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to start"))?;

    let listener = startup::bind_listener(&config.listener.bind_address)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Failed to start"))?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_config(config: &ProxyConfig) {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        min_tls = ?config.upstream.tls.min_version,
        client_operation = %config.operation.client_name,
        upstream_operation = %config.operation.upstream_name,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );
}
