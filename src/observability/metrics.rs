//! Metrics collection through the `metrics` facade.
//!
//! # Metrics
//! - `resilience_attempts_total` (counter): attempts by operation
//! - `resilience_retries_total` (counter): scheduled retries by operation, kind
//! - `resilience_rejections_total` (counter): calls refused by an open breaker
//! - `resilience_timeouts_total` (counter): attempts cancelled by the timeout guard
//! - `resilience_fallbacks_total` (counter): secondary strategies invoked
//! - `resilience_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Recording only; the host installs whatever recorder/exporter it wants
//! - Without an installed recorder every call is a no-op

use std::time::Duration;
use metrics::{counter, gauge};

use crate::observability::observer::ResilienceObserver;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::errors::FailureKind;

/// Observer publishing resilience events as metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl MetricsObserver {
    pub fn new() -> Self {
        Self
    }
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

impl ResilienceObserver for MetricsObserver {
    fn on_state_change(&self, operation: &str, _from: CircuitState, to: CircuitState) {
        gauge!("resilience_breaker_state", "operation" => operation.to_string()).set(state_value(to));
    }

    fn on_attempt(&self, operation: &str, _attempt: u32) {
        counter!("resilience_attempts_total", "operation" => operation.to_string()).increment(1);
    }

    fn on_retry(&self, operation: &str, _attempt: u32, kind: FailureKind, _delay: Duration) {
        counter!(
            "resilience_retries_total",
            "operation" => operation.to_string(),
            "kind" => kind.to_string()
        )
        .increment(1);
    }

    fn on_rejected(&self, operation: &str) {
        counter!("resilience_rejections_total", "operation" => operation.to_string()).increment(1);
    }

    fn on_timeout(&self, operation: &str, _limit: Duration) {
        counter!("resilience_timeouts_total", "operation" => operation.to_string()).increment(1);
    }

    fn on_fallback(&self, operation: &str, _primary_kind: FailureKind) {
        counter!("resilience_fallbacks_total", "operation" => operation.to_string()).increment(1);
    }
}
