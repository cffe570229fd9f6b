//! Pooled HTTPS client for the upstream SOAP service.
//!
//! # Responsibilities
//! - Build the rustls policy (minimum version, verified certificates)
//! - Keep a bounded pool of idle keep-alive connections
//! - Enforce connect, handshake, response-header and overall deadlines
//! - Make exactly one attempt per forwarded request, including when a pooled
//!   connection closes before the request is written
//!
//! # Design Decisions
//! - HTTPS only; there is no switch to skip certificate verification
//! - Concurrent calls beyond `max_in_flight` wait for a slot, never fail
//! - Failures are classified once here into `TransportError`

use async_trait::async_trait;
use axum::http::{header, HeaderValue, Method, Request, Uri};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::config::{ProxyConfig, TlsVersion, UpstreamTlsConfig};
use crate::upstream::connector::TlsConnect;
use crate::upstream::error::{TimeoutPhase, TransportError, UpstreamError};
use crate::upstream::{Forward, UpstreamRequest, UpstreamResponse, SOAP_CONTENT_TYPE};

static TLS12_AND_UP: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Errors building the client at startup.
#[derive(Debug, Error)]
pub enum UpstreamBuildError {
    #[error("invalid upstream url '{url}': {source}")]
    Endpoint {
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },

    #[error("failed to read CA bundle {path:?}: {source}")]
    CaBundle {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),
}

#[derive(Debug, Clone, Copy)]
struct Deadlines {
    connect: Duration,
    handshake: Duration,
    response_headers: Duration,
    request: Duration,
}

impl Deadlines {
    /// Bound on `client.request`, which covers connection setup on a cold
    /// pool. Setup has its own deadlines, so they fire before this one.
    fn until_headers(&self) -> Duration {
        self.connect + self.handshake + self.response_headers
    }
}

/// HTTPS client bound to the single configured upstream endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<TlsConnect, Full<Bytes>>,
    endpoint: Uri,
    deadlines: Deadlines,
    in_flight: Arc<Semaphore>,
}

impl UpstreamClient {
    /// Create the client from the process configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, UpstreamBuildError> {
        let endpoint: Uri = config
            .upstream
            .url
            .parse()
            .map_err(|source| UpstreamBuildError::Endpoint {
                url: config.upstream.url.clone(),
                source,
            })?;

        let tls = build_tls_config(&config.upstream.tls)?;
        let deadlines = Deadlines {
            connect: Duration::from_secs(config.timeouts.connect_secs),
            handshake: Duration::from_secs(config.timeouts.tls_handshake_secs),
            response_headers: Duration::from_secs(config.timeouts.response_header_secs),
            request: Duration::from_secs(config.timeouts.request_secs),
        };

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(deadlines.connect));

        let connector = TlsConnect::new(http, Arc::new(tls), deadlines.handshake);

        // One upstream host, so the aggregate idle bound caps the per-host one.
        let pool = &config.upstream.pool;
        let max_idle = pool.max_idle.min(pool.max_idle_per_host);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(max_idle)
            .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
            .retry_canceled_requests(false)
            .build(connector);

        tracing::info!(
            endpoint = %endpoint,
            min_tls = ?config.upstream.tls.min_version,
            max_idle,
            max_in_flight = pool.max_in_flight,
            "Upstream client configured"
        );

        Ok(Self {
            client,
            endpoint,
            deadlines,
            in_flight: Arc::new(Semaphore::new(pool.max_in_flight)),
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    async fn exchange(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let _slot = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| TransportError::Other { detail: e.to_string() })?;

        let mut req = Request::new(Full::new(request.body));
        *req.method_mut() = Method::POST;
        *req.uri_mut() = self.endpoint.clone();
        *req.headers_mut() = request.headers;
        req.headers_mut()
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(SOAP_CONTENT_TYPE));

        let until_headers = self.deadlines.until_headers();
        let response = match timeout(until_headers, self.client.request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(TransportError::classify(&e, self.deadlines.connect).into()),
            Err(_) => {
                return Err(TransportError::Timeout {
                    phase: TimeoutPhase::ResponseHeaders,
                    after: until_headers,
                }
                .into())
            }
        };

        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(UpstreamError::Body)?.to_bytes();

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Forward for UpstreamClient {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        match timeout(self.deadlines.request, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                phase: TimeoutPhase::Request,
                after: self.deadlines.request,
            }
            .into()),
        }
    }
}

fn build_tls_config(config: &UpstreamTlsConfig) -> Result<rustls::ClientConfig, UpstreamBuildError> {
    let mut roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    if let Some(path) = &config.extra_ca_path {
        let path = PathBuf::from(path);
        let ca_error = |source: std::io::Error| UpstreamBuildError::CaBundle {
            path: path.clone(),
            source,
        };
        let mut reader = BufReader::new(File::open(&path).map_err(ca_error)?);
        let mut added = 0usize;
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert.map_err(ca_error)?)?;
            added += 1;
        }
        tracing::info!(path = ?path, certificates = added, "Loaded extra upstream CA certificates");
    }

    let versions = match config.min_version {
        TlsVersion::Tls12 => TLS12_AND_UP,
        TlsVersion::Tls13 => TLS13_ONLY,
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(tls)
}
