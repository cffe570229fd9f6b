//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files, and
//! every default reproduces the fixed deployment the bridge was built for.

use serde::{Deserialize, Serialize};

/// Root configuration for the SOAP bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Upstream SOAP service and transport policy.
    pub upstream: UpstreamConfig,

    /// Timeout configuration for upstream calls.
    pub timeouts: TimeoutConfig,

    /// The single proxied operation and its two renderings.
    pub operation: OperationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1236").
    pub bind_address: String,

    /// Largest inbound SOAP body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Ceiling for a whole inbound request, including the upstream call.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:1236".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 90,
        }
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// HTTPS endpoint the translated envelopes are posted to.
    pub url: String,

    /// User-Agent sent upstream when the caller did not provide one.
    pub default_user_agent: String,

    /// Inbound headers starting with this prefix are forwarded (case-insensitive).
    pub forwarded_header_prefix: String,

    /// TLS policy for the upstream connection.
    pub tls: UpstreamTlsConfig,

    /// Connection pool limits.
    pub pool: PoolConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://ariregxmlv6.rik.ee/".to_string(),
            default_user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            forwarded_header_prefix: "x-road".to_string(),
            tls: UpstreamTlsConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

/// Lowest TLS protocol version the upstream client will negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

/// Upstream TLS configuration.
///
/// Certificate verification cannot be switched off; the only knob is which
/// extra roots are trusted on top of the bundled webpki set.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamTlsConfig {
    /// Minimum protocol version (no downgrade below it).
    pub min_version: TlsVersion,

    /// Optional PEM bundle of additional trusted CA certificates.
    pub extra_ca_path: Option<String>,
}

/// Upstream connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle connections kept across all hosts.
    pub max_idle: usize,

    /// Maximum idle connections kept per host.
    pub max_idle_per_host: usize,

    /// How long an idle connection stays pooled, in seconds.
    pub idle_timeout_secs: u64,

    /// Maximum concurrent upstream calls; further calls wait for a slot.
    pub max_in_flight: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 10,
            max_idle_per_host: 5,
            idle_timeout_secs: 90,
            max_in_flight: 64,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// TLS handshake timeout in seconds, granted after the TCP connect.
    pub tls_handshake_secs: u64,

    /// Time allowed between sending the request and receiving response headers.
    pub response_header_secs: u64,

    /// Total time for one forwarding call (queueing, handshake, transfer).
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            tls_handshake_secs: 10,
            response_header_secs: 30,
            request_secs: 60,
        }
    }
}

/// The proxied operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationConfig {
    /// Operation name as clients spell it.
    pub client_name: String,

    /// Operation name as the upstream service spells it.
    pub upstream_name: String,

    /// Suffix appended to both names for the response element.
    pub response_suffix: String,

    /// Target namespace advertised in the WSDL.
    pub namespace: String,

    /// Base name for the WSDL service, port type, binding and port.
    pub service_name: String,

    /// Human readable description placed in the WSDL service documentation.
    pub description: String,

    /// Element path below the operation element holding the business identifier.
    pub business_id_path: Vec<String>,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            client_name: "ettevottegaSeotudIsikudV1".to_string(),
            upstream_name: "ettevottegaSeotudIsikud_v1".to_string(),
            response_suffix: "Response".to_string(),
            namespace: "http://arireg.x-road.eu/producer/".to_string(),
            service_name: "AriregProxy".to_string(),
            description: "Proxy service for Estonian Business Registry (Äriregister)".to_string(),
            business_id_path: vec!["keha".to_string(), "ariregistri_kood".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
