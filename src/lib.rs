//! SOAP bridge between clients and the Estonian Business Registry service.
//!
//! Clients call `ettevottegaSeotudIsikudV1`; the registry expects
//! `ettevottegaSeotudIsikud_v1`. The bridge validates each envelope, renames
//! the operation on the way in and back on the way out, and forwards over a
//! verified TLS connection.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod soap;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
