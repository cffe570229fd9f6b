//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject operation renderings that could splice into each other, so a
//!   second translation pass never changes the output of the first
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid upstream url '{url}': {reason}")]
    UpstreamUrl { url: String, reason: String },

    #[error("operation name '{0}' must not be empty")]
    EmptyOperationName(&'static str),

    #[error("operation names '{client}' and '{upstream}' overlap")]
    OverlappingOperationNames { client: String, upstream: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Err(reason) = check_upstream_url(&config.upstream.url) {
        errors.push(ValidationError::UpstreamUrl {
            url: config.upstream.url.clone(),
            reason,
        });
    }

    let op = &config.operation;
    if op.client_name.is_empty() {
        errors.push(ValidationError::EmptyOperationName("operation.client_name"));
    }
    if op.upstream_name.is_empty() {
        errors.push(ValidationError::EmptyOperationName("operation.upstream_name"));
    }
    if !op.client_name.is_empty()
        && !op.upstream_name.is_empty()
        && names_overlap(&op.client_name, &op.upstream_name)
    {
        errors.push(ValidationError::OverlappingOperationNames {
            client: op.client_name.clone(),
            upstream: op.upstream_name.clone(),
        });
    }

    let positive = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.tls_handshake_secs", config.timeouts.tls_handshake_secs),
        ("timeouts.response_header_secs", config.timeouts.response_header_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("upstream.pool.max_in_flight", config.upstream.pool.max_in_flight as u64),
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(name));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Whether a replacement can combine with neighbouring bytes into a name
/// the same pass is looking for: one name inside the other, or a suffix of
/// one equal to a prefix of the other.
///
/// Only the bare names matter. The bare pass runs last and every response
/// rendering contains its bare name, so output free of bare source names is
/// free of response ones too.
fn names_overlap(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let contains = |haystack: &[u8], needle: &[u8]| {
        haystack.windows(needle.len()).any(|window| window == needle)
    };
    contains(a, b)
        || contains(b, a)
        || (1..a.len().min(b.len())).any(|k| a.ends_with(&b[..k]) || b.ends_with(&a[..k]))
}

fn check_upstream_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "https" {
        return Err(format!("scheme must be https, got {}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}
