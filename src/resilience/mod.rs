//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external dependency:
//!     → registry.rs (breaker for the operation key)
//!     → circuit_breaker.rs (fail fast if open, count the outcome)
//!     → retries.rs (re-attempt with backoff.rs delays until the policy gives up)
//!     → timeouts.rs (bound each attempt, honor caller cancellation)
//!     → errors.rs (classify what comes back)
//!
//! Optionally, around all of it:
//!     → fallback.rs (secondary strategy when the primary fails)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - The breaker wraps the whole retry sequence: one logical call, one recorded outcome
//! - Only the breaker holds shared state; everything else is per call
//! - All resilience logic is explicit composition (see pipeline.rs)

pub mod backoff;
pub mod circuit_breaker;
pub mod errors;
pub mod fallback;
pub mod pipeline;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use backoff::Backoff;
pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use errors::{
    ClassifiedFailure, Classify, DefaultClassifier, Disposition, FailureKind, InnerClassifier,
    ResilienceError,
};
pub use fallback::{FailureSummary, FallbackExecutor, FallbackFailure};
pub use pipeline::{CallOptions, Resilience};
pub use registry::BreakerRegistry;
pub use retries::RetryExecutor;
pub use timeouts::TimeoutGuard;
