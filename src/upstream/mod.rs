//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! translated envelope + allow-listed headers
//!     → client.rs (wait for in-flight slot, pooled HTTPS POST)
//!     → connector.rs (TCP connect, then TLS handshake on its own deadline)
//!     → error.rs (typed failure classification)
//!     → buffered status, headers and body back to the orchestrator
//! ```

pub mod client;
pub mod connector;
pub mod error;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

pub use client::{UpstreamBuildError, UpstreamClient};
pub use connector::{ConnectTargetError, HandshakeTimedOut, TlsConnect};
pub use error::{TimeoutPhase, TransportError, UpstreamError};

/// Content type of SOAP 1.1 messages in both directions.
pub const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// A translated envelope ready to be sent upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub body: Bytes,
    pub headers: HeaderMap,
}

/// A fully buffered upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One forwarding call per inbound request. No retries.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}
