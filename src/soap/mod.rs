//! SOAP payload handling.
//!
//! # Data Flow
//! ```text
//! inbound bytes
//!     → envelope.rs (well-formed SOAP 1.1 envelope with a Body?)
//!     → operation.rs (which operation, which company; logs only)
//!     → naming.rs (rename operation for upstream)
//!
//! upstream bytes
//!     → naming.rs (rename operation back for the client)
//! ```

pub mod envelope;
pub mod naming;
pub mod operation;

pub use envelope::{Envelope, EnvelopeError, SOAP_ENV_NS};
pub use naming::{Direction, NameTranslator};
pub use operation::{OperationProbe, OperationRecord};
