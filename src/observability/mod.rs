//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and the upstream client produce:
//!     → logging.rs (structured events inside a per-request span)
//!     → metrics.rs (request counter and latency histogram)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON lines for aggregation)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID and remote address live on the span, not on every event
//! - Metrics go through the `metrics` facade; without an exporter they are no-ops

pub mod logging;
pub mod metrics;
