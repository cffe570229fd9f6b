//! Upstream failure taxonomy.
//!
//! Transport failures are classified from the error source chain by type:
//! `io::ErrorKind::ConnectionRefused`, `rustls::Error`, and the timeout
//! markers produced by this crate. Message text is never inspected.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::upstream::connector::HandshakeTimedOut;

/// Which wait ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Handshake,
    ResponseHeaders,
    Request,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimeoutPhase::Connect => "TCP connect",
            TimeoutPhase::Handshake => "TLS handshake",
            TimeoutPhase::ResponseHeaders => "response headers",
            TimeoutPhase::Request => "whole request",
        })
    }
}

/// Failure to complete the exchange with the upstream at the network level.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("TLS failure: {detail}")]
    Tls { detail: String },

    #[error("timed out waiting for {phase} after {after:?}")]
    Timeout { phase: TimeoutPhase, after: Duration },

    #[error("connection refused: {detail}")]
    ConnectionRefused { detail: String },

    #[error("transport error: {detail}")]
    Other { detail: String },
}

impl TransportError {
    /// Short label used in logs and metrics.
    pub fn classification(&self) -> &'static str {
        match self {
            TransportError::Tls { .. } => "tls",
            TransportError::Timeout { .. } => "timeout",
            TransportError::ConnectionRefused { .. } => "connection refused",
            TransportError::Other { .. } => "generic",
        }
    }

    /// Classify a client error by walking its sources.
    ///
    /// `connect_timeout` is reported when the TCP connector gave up on its own.
    pub fn classify(err: &(dyn StdError + 'static), connect_timeout: Duration) -> Self {
        let detail = error_chain(err);
        let mut current = Some(err);

        while let Some(e) = current {
            if let Some(timed_out) = e.downcast_ref::<HandshakeTimedOut>() {
                return TransportError::Timeout {
                    phase: TimeoutPhase::Handshake,
                    after: timed_out.0,
                };
            }
            if e.is::<rustls::Error>() {
                return TransportError::Tls { detail };
            }
            if let Some(io) = e.downcast_ref::<io::Error>() {
                match io.kind() {
                    io::ErrorKind::ConnectionRefused => {
                        return TransportError::ConnectionRefused { detail };
                    }
                    io::ErrorKind::TimedOut => {
                        return TransportError::Timeout {
                            phase: TimeoutPhase::Connect,
                            after: connect_timeout,
                        };
                    }
                    _ => {}
                }
            }
            current = next_cause(e);
        }

        TransportError::Other { detail }
    }
}

/// Everything that can go wrong forwarding one request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to read upstream response body: {0}")]
    Body(#[source] hyper::Error),
}

impl UpstreamError {
    pub fn classification(&self) -> &'static str {
        match self {
            UpstreamError::Transport(transport) => transport.classification(),
            UpstreamError::Body(_) => "response read",
        }
    }
}

/// `io::Error` hides a wrapped error from `source()`, so look inside it first.
fn next_cause<'a>(e: &'a (dyn StdError + 'static)) -> Option<&'a (dyn StdError + 'static)> {
    if let Some(io) = e.downcast_ref::<io::Error>() {
        if let Some(inner) = io.get_ref() {
            let inner: &(dyn StdError + 'static) = inner;
            return Some(inner);
        }
    }
    e.source()
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = next_cause(err);
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = next_cause(e);
    }
    parts.join(": ")
}
