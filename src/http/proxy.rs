//! SOAP request orchestration.
//!
//! # Data Flow
//! ```text
//! POST /soap
//!     → read body (bounded)
//!     → envelope.rs validation (400 on failure, nothing forwarded)
//!     → operation probe (log only)
//!     → client name → upstream name
//!     → headers.rs allow-list
//!     → Forward (one attempt)
//!     → upstream name → client name
//!     → status + filtered headers + recomputed Content-Length
//! ```
//!
//! GET and `?wsdl` requests are answered by discovery.rs and never reach
//! the upstream.

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::Method,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::Instrument;

use crate::http::discovery::{wants_discovery, wsdl_response};
use crate::http::error::ProxyError;
use crate::http::headers::{client_headers, SOAP_ACTION};
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::soap::{Direction, Envelope};
use crate::upstream::UpstreamRequest;

/// `/soap` endpoint.
pub async fn soap_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    if wants_discovery(request.method(), request.uri()) {
        let (parts, _body) = request.into_parts();
        return wsdl_response(&state, remote, &parts);
    }

    let span = tracing::info_span!(
        "soap",
        request_id = %request_id(request.headers()),
        remote = %remote
    );
    relay(state, request).instrument(span).await
}

async fn relay(state: AppState, request: Request) -> Response {
    let started = Instant::now();
    tracing::info!(
        version = ?request.version(),
        method = %request.method(),
        path = %request.uri().path(),
        "SOAP request"
    );

    match process(&state, request, started).await {
        Ok(response) => {
            metrics::record_request("forwarded", response.status(), started);
            response
        }
        Err(err) => {
            let status = err.status();
            metrics::record_request(err.classification(), status, started);
            tracing::warn!(
                status = status.as_u16(),
                classification = err.classification(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request failed"
            );
            err.into_response()
        }
    }
}

async fn process(state: &AppState, request: Request, started: Instant) -> Result<Response, ProxyError> {
    if request.method() != Method::POST {
        return Err(ProxyError::MethodNotAllowed(request.method().clone()));
    }

    let (parts, body) = request.into_parts();
    let payload = axum::body::to_bytes(body, state.config.listener.max_body_bytes)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Error reading request body");
            ProxyError::ReadBody(e)
        })?;
    tracing::info!(bytes = payload.len(), "Received SOAP request");

    let envelope = Envelope::parse(&payload).map_err(|e| {
        tracing::error!(error = %e, bytes = payload.len(), "Invalid SOAP envelope");
        e
    })?;
    if let Some(record) = state.probe.inspect(envelope.body()) {
        tracing::info!(
            operation = %record.operation,
            business_id = %record.business_id,
            "Operation identified"
        );
    }

    let outbound = Bytes::from(state.translator.translate(&payload, Direction::ToUpstream));
    if let Some(action) = parts.headers.get(SOAP_ACTION) {
        tracing::debug!(soap_action = ?action, "Forwarding SOAPAction");
    }
    let headers = state.header_policy.outbound(&parts.headers);

    tracing::info!(
        upstream = %state.config.upstream.url,
        bytes = outbound.len(),
        "Forwarding request"
    );
    let request_bytes = outbound.len();
    let reply = state
        .upstream
        .forward(UpstreamRequest { body: outbound, headers })
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                classification = e.classification(),
                upstream = %state.config.upstream.url,
                bytes = request_bytes,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Error forwarding request"
            );
            e
        })?;

    tracing::info!(
        status = reply.status.as_u16(),
        bytes = reply.body.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Upstream responded"
    );

    let body = state.translator.translate(&reply.body, Direction::ToClient);
    let headers = client_headers(&reply.headers, body.len());
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = reply.status;
    *response.headers_mut() = headers;

    tracing::info!(
        status = reply.status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );
    Ok(response)
}
