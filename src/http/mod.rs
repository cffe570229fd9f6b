//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, routes)
//!     → request.rs (request ID assigned)
//!     → proxy.rs (validate, translate, forward, translate back)
//!         ├─ discovery.rs (GET / ?wsdl → WSDL, never forwarded)
//!         ├─ headers.rs (allow-list out, hop-by-hop strip in)
//!         └─ error.rs (failure → status + short plain-text message)
//!     → Send to client
//! ```

pub mod discovery;
pub mod error;
pub mod headers;
pub mod proxy;
pub mod request;
pub mod server;
pub mod status;

pub use error::ProxyError;
pub use headers::HeaderPolicy;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, HEALTH_PATH, SOAP_PATH, WSDL_PATH};
