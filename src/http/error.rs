//! Per-request failures and their client-visible responses.
//!
//! Every variant maps to one status and one short plain-text message. The
//! transport distinction is kept in the message for operators; all transport
//! failures share the 502 status.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::soap::EnvelopeError;
use crate::upstream::{TransportError, UpstreamError};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("failed to read request body: {0}")]
    ReadBody(#[source] axum::Error),

    #[error("invalid SOAP envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::ReadBody(_) | ProxyError::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(UpstreamError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream(UpstreamError::Body(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text returned to the caller. Never includes upstream internals.
    pub fn client_message(&self) -> &'static str {
        match self {
            ProxyError::MethodNotAllowed(_) => "Only POST method is allowed for SOAP requests",
            ProxyError::ReadBody(_) => "Error reading request body",
            ProxyError::InvalidEnvelope(_) => "Error parsing SOAP envelope",
            ProxyError::Upstream(UpstreamError::Transport(transport)) => match transport {
                TransportError::Tls { .. } => {
                    "TLS/SSL connection error. Check certificate configuration."
                }
                TransportError::Timeout { .. } => {
                    "Backend service timeout. Service may be unavailable."
                }
                TransportError::ConnectionRefused { .. } => {
                    "Backend service refused connection. Service may be down."
                }
                TransportError::Other { .. } => "Error forwarding request to backend.",
            },
            ProxyError::Upstream(UpstreamError::Body(_)) => "Error reading response",
        }
    }

    /// Label for logs and metrics.
    pub fn classification(&self) -> &'static str {
        match self {
            ProxyError::MethodNotAllowed(_) => "method not allowed",
            ProxyError::ReadBody(_) => "request read",
            ProxyError::InvalidEnvelope(_) => "invalid envelope",
            ProxyError::Upstream(upstream) => upstream.classification(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status(),
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{}\n", self.client_message()),
        )
            .into_response();

        if matches!(self, ProxyError::MethodNotAllowed(_)) {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }
}
