//! Outbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Caller
//!     → client.rs (operation name, method, target, payload)
//!     → request.rs (validate target, build the outbound request)
//!     → [resilience pipeline: breaker → retry → timeout]
//!     → transport.rs (send over the wire, map errors and statuses)
//!     → response.rs (status + body handed back)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait so hosts and tests can plug their own
//! - Status >= 500 and connection failures are worth retrying; 4xx are not
//! - A target that does not parse never reaches the breaker

pub mod client;
pub mod request;
pub mod response;
pub mod transport;

pub use client::ResilientClient;
pub use request::OutboundRequest;
pub use response::OutboundResponse;
pub use transport::{HttpClassifier, ReqwestTransport, Transport, TransportError};
