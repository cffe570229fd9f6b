//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the configuration (file or defaults, then CLI overrides)
//! - Bind the listener with a clear fatal error when the port is taken
//!
//! # Design Decisions
//! - Overrides are validated again, so a bad `--bind` fails like a bad file

use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, validate_config, ConfigError, ProxyConfig};
use crate::upstream::UpstreamBuildError;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] UpstreamBuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// Load `path` when given, else use defaults, then apply `bind_override`.
pub fn resolve_config(
    path: Option<&Path>,
    bind_override: Option<String>,
) -> Result<ProxyConfig, StartupError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(bind) = bind_override {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Bind the inbound listener.
pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
