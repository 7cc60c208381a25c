//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilience layers produce:
//!     → tracing events and spans (operation key, call id)
//!     → observer.rs hooks (state changes, attempts, retries, rejections, timeouts, fallbacks)
//!
//! Consumers:
//!     → logging.rs (subscriber setup: env filter, pretty or JSON output)
//!     → metrics.rs (observer recording through the `metrics` facade)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Hooks are optional; the default observer does nothing
//! - Metrics are cheap (atomic increments) and exported by the host, not here

pub mod logging;
pub mod metrics;
pub mod observer;

pub use logging::init_logging;
pub use metrics::MetricsObserver;
pub use observer::{NoopObserver, ObserverSet, ResilienceObserver};
