//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use soap_bridge::config::ProxyConfig;
use soap_bridge::upstream::{Forward, UpstreamError, UpstreamRequest, UpstreamResponse};
use soap_bridge::HttpServer;

pub const CLIENT_REQUEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:prod="http://arireg.x-road.eu/producer/">
  <soapenv:Header/>
  <soapenv:Body>
    <prod:ettevottegaSeotudIsikudV1>
      <prod:keha>
        <prod:ariregistri_kood>10000018</prod:ariregistri_kood>
      </prod:keha>
    </prod:ettevottegaSeotudIsikudV1>
  </soapenv:Body>
</soapenv:Envelope>"#;

pub const UPSTREAM_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="http://arireg.x-road.eu/producer/">
  <SOAP-ENV:Body>
    <ns1:ettevottegaSeotudIsikud_v1Response>
      <ns1:keha><ns1:isikud>Mari Maasikas</ns1:isikud></ns1:keha>
    </ns1:ettevottegaSeotudIsikud_v1Response>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

pub const REMOTE: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::new(192, 0, 2, 10)),
    40123,
);

type Reply = dyn Fn(&UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> + Send + Sync;

/// In-process upstream that records every forwarded request.
pub struct StubUpstream {
    calls: Mutex<Vec<UpstreamRequest>>,
    reply: Box<Reply>,
}

impl StubUpstream {
    pub fn replying<F>(reply: F) -> Arc<Self>
    where
        F: Fn(&UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        })
    }

    /// Answers every call with `body` and status 200.
    pub fn with_body(body: &'static str) -> Arc<Self> {
        Self::replying(move |_| Ok(ok_response(body)))
    }

    pub fn failing<F>(error: F) -> Arc<Self>
    where
        F: Fn() -> UpstreamError + Send + Sync + 'static,
    {
        Self::replying(move |_| Err(error()))
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Forward for StubUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let result = (self.reply)(&request);
        self.calls.lock().unwrap().push(request);
        result
    }
}

pub fn ok_response(body: &'static str) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "text/xml; charset=utf-8".parse().unwrap());
    headers.insert("content-length", body.len().to_string().parse().unwrap());
    UpstreamResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from_static(body.as_bytes()),
    }
}

pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Router wired to `upstream`, with a fixed peer address.
pub fn app(upstream: Arc<StubUpstream>) -> Router {
    app_with_config(test_config(), upstream)
}

pub fn app_with_config(config: ProxyConfig, upstream: Arc<dyn Forward>) -> Router {
    HttpServer::new(config, upstream)
        .router()
        .layer(MockConnectInfo(REMOTE))
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Free local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Accepts connections and never writes a byte.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Speaks plain HTTP/1.1 to whatever connects, TLS client hello included.
pub async fn start_plaintext_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n")
                    .await;
                tokio::time::sleep(Duration::from_secs(2)).await;
            });
        }
    });
    addr
}

const SERVER_CERT: &[u8] = include_bytes!("../fixtures/server.pem");
const SERVER_KEY: &[u8] = include_bytes!("../fixtures/server.key");

/// CA that signed the local TLS backend's certificate.
pub fn test_ca_path() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/ca.pem").to_string()
}

/// How the local TLS backend answers each request.
#[derive(Debug, Clone, Copy)]
pub enum TlsReply {
    /// 200 with this body, keeping the connection open.
    Body(&'static str),
    /// Headers promising more body than is sent, then the socket closes.
    Truncated,
    /// Read the request and never answer.
    Silent,
}

/// HTTPS server on 127.0.0.1 that records each raw request it reads.
pub struct TlsBackend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TlsBackend {
    pub fn url(&self) -> String {
        format!("https://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub async fn start_tls_backend(reply: TlsReply) -> TlsBackend {
    let certs = rustls_pemfile::certs(&mut &SERVER_CERT[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &SERVER_KEY[..]).unwrap().unwrap();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let tls = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(tls));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let Ok(mut stream) = acceptor.accept(socket).await else {
                    return;
                };
                while let Some(request) = read_request(&mut stream).await {
                    seen.lock().unwrap().push(request);
                    match reply {
                        TlsReply::Body(body) => {
                            let head = format!(
                                "HTTP/1.1 200 OK\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\n\r\n",
                                body.len()
                            );
                            if stream.write_all(head.as_bytes()).await.is_err()
                                || stream.write_all(body.as_bytes()).await.is_err()
                            {
                                return;
                            }
                        }
                        TlsReply::Truncated => {
                            let _ = stream
                                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\n<partial")
                                .await;
                            let _ = stream.flush().await;
                            return;
                        }
                        TlsReply::Silent => {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            return;
                        }
                    }
                }
            });
        }
    });

    TlsBackend { addr, requests }
}

/// One HTTP/1.1 request: head plus a `Content-Length` body.
async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(at) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break at + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}
