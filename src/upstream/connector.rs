//! Connection setup for the upstream: TCP first, then TLS.
//!
//! The TCP connector carries the connect timeout. The handshake clock only
//! starts once the socket is open, so a peer that accepts but never answers
//! the client hello fails after `tls_handshake_secs` on its own.

use axum::http::uri::{Scheme, Uri};
use hyper_rustls::MaybeHttpsStream;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stream handed to the pool: always the `Https` arm in practice.
pub type UpstreamStream = MaybeHttpsStream<TokioIo<TcpStream>>;

/// Marker error produced when the handshake deadline passes.
#[derive(Debug, Error)]
#[error("TLS handshake did not complete within {0:?}")]
pub struct HandshakeTimedOut(pub Duration);

/// Request URIs the connector refuses before opening a socket.
#[derive(Debug, Error)]
pub enum ConnectTargetError {
    #[error("refusing non-https upstream uri '{0}'")]
    NotHttps(Uri),

    #[error("upstream uri '{0}' has no valid TLS server name")]
    ServerName(Uri),
}

/// TCP connector followed by a rustls handshake bounded by its own deadline.
#[derive(Clone)]
pub struct TlsConnect<T = HttpConnector> {
    tcp: T,
    tls: TlsConnector,
    handshake_timeout: Duration,
}

impl<T> TlsConnect<T> {
    pub fn new(tcp: T, tls: Arc<rustls::ClientConfig>, handshake_timeout: Duration) -> Self {
        Self {
            tcp,
            tls: TlsConnector::from(tls),
            handshake_timeout,
        }
    }
}

impl<T> Service<Uri> for TlsConnect<T>
where
    T: Service<Uri, Response = TokioIo<TcpStream>>,
    T::Error: Into<BoxError> + 'static,
    T::Future: Send + 'static,
{
    type Response = UpstreamStream;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<UpstreamStream, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.tcp.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let server_name = match server_name(&uri) {
            Ok(name) => name,
            Err(e) => return Box::pin(async move { Err::<UpstreamStream, BoxError>(e.into()) }),
        };
        let connecting = self.tcp.call(uri);
        Box::pin(connect_tls(
            connecting,
            self.tls.clone(),
            server_name,
            self.handshake_timeout,
        ))
    }
}

async fn connect_tls<F, E>(
    connecting: F,
    tls: TlsConnector,
    server_name: ServerName<'static>,
    deadline: Duration,
) -> Result<UpstreamStream, BoxError>
where
    F: Future<Output = Result<TokioIo<TcpStream>, E>>,
    E: Into<BoxError>,
{
    let tcp = connecting.await.map_err(Into::<BoxError>::into)?;
    match tokio::time::timeout(deadline, tls.connect(server_name, TokioIo::new(tcp))).await {
        Ok(Ok(stream)) => Ok(MaybeHttpsStream::Https(TokioIo::new(stream))),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(HandshakeTimedOut(deadline).into()),
    }
}

fn server_name(uri: &Uri) -> Result<ServerName<'static>, ConnectTargetError> {
    if uri.scheme() != Some(&Scheme::HTTPS) {
        return Err(ConnectTargetError::NotHttps(uri.clone()));
    }
    let host = uri
        .host()
        .ok_or_else(|| ConnectTargetError::ServerName(uri.clone()))?;
    // IPv6 literals keep their brackets in the authority.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    ServerName::try_from(host.to_string()).map_err(|_| ConnectTargetError::ServerName(uri.clone()))
}
