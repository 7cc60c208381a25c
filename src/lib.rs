//! Outbound Resilience Library
//!
//! Circuit breaking, retries with backoff, per-attempt timeouts and fallbacks for calls
//! to external dependencies, plus an HTTP client that composes them per named operation.

pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;

pub use config::schema::ResilienceConfig;
pub use http::ResilientClient;
pub use resilience::{ClassifiedFailure, FailureKind, Resilience};
