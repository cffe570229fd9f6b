//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the SOAP, WSDL, health and landing handlers
//! - Wire up middleware (tracing, request ID, request timeout)
//! - Bind the server to a listener and drain on shutdown
//!
//! # Design Decisions
//! - Handlers share one immutable `AppState`; nothing is mutated per request
//! - The upstream sits behind the `Forward` trait so tests can substitute it
//! - Unknown paths fall back to the landing page

use axum::{routing::any, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::discovery::wsdl_handler;
use crate::http::headers::HeaderPolicy;
use crate::http::proxy::soap_handler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::status::{health_handler, landing_handler};
use crate::soap::{NameTranslator, OperationProbe};
use crate::upstream::{Forward, UpstreamBuildError, UpstreamClient};

pub const SOAP_PATH: &str = "/soap";
pub const WSDL_PATH: &str = "/wsdl";
pub const HEALTH_PATH: &str = "/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<dyn Forward>,
    pub translator: Arc<NameTranslator>,
    pub probe: Arc<OperationProbe>,
    pub header_policy: Arc<HeaderPolicy>,
    pub config: Arc<ProxyConfig>,
}

/// HTTP server for the SOAP bridge.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a server forwarding through `upstream`.
    pub fn new(config: ProxyConfig, upstream: Arc<dyn Forward>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            upstream,
            translator: Arc::new(NameTranslator::from_config(&config.operation)),
            probe: Arc::new(OperationProbe::from_config(&config.operation)),
            header_policy: Arc::new(HeaderPolicy::from_config(&config.upstream)),
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Create a server with the real HTTPS upstream client.
    pub fn from_config(config: ProxyConfig) -> Result<Self, UpstreamBuildError> {
        let upstream = UpstreamClient::new(&config)?;
        Ok(Self::new(config, Arc::new(upstream)))
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(SOAP_PATH, any(soap_handler))
            .route(WSDL_PATH, any(wsdl_handler))
            .route(HEALTH_PATH, any(health_handler))
            .route("/", any(landing_handler))
            .fallback(landing_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for serving through something other than `run`.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            soap = %format!("http://{addr}{SOAP_PATH}"),
            wsdl = %format!("http://{addr}{WSDL_PATH}"),
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
