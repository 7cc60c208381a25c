//! Hook points for external collectors.
//!
//! Every method has a no-op default, so collectors implement only what they need.
//! Hooks are called outside the breaker's critical section.

use std::sync::Arc;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::errors::FailureKind;

pub trait ResilienceObserver: Send + Sync {
    /// Breaker for `operation` moved from `from` to `to`.
    fn on_state_change(&self, _operation: &str, _from: CircuitState, _to: CircuitState) {}

    /// Attempt number `attempt` (1-based) is about to run.
    fn on_attempt(&self, _operation: &str, _attempt: u32) {}

    /// Attempt `attempt` failed with `kind`; the next one starts after `delay`.
    fn on_retry(&self, _operation: &str, _attempt: u32, _kind: FailureKind, _delay: Duration) {}

    /// Call rejected by an open breaker without invoking the operation.
    fn on_rejected(&self, _operation: &str) {}

    /// Attempt cancelled after exceeding `limit`.
    fn on_timeout(&self, _operation: &str, _limit: Duration) {}

    /// Primary failed and the secondary strategy is being invoked.
    fn on_fallback(&self, _operation: &str, _primary_kind: FailureKind) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResilienceObserver for NoopObserver {}

/// Shared handle to a no-op observer.
pub fn noop() -> Arc<dyn ResilienceObserver> {
    Arc::new(NoopObserver)
}

/// Fans every hook out to several observers, in order.
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn ResilienceObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl ResilienceObserver for ObserverSet {
    fn on_state_change(&self, operation: &str, from: CircuitState, to: CircuitState) {
        for o in &self.observers {
            o.on_state_change(operation, from, to);
        }
    }

    fn on_attempt(&self, operation: &str, attempt: u32) {
        for o in &self.observers {
            o.on_attempt(operation, attempt);
        }
    }

    fn on_retry(&self, operation: &str, attempt: u32, kind: FailureKind, delay: Duration) {
        for o in &self.observers {
            o.on_retry(operation, attempt, kind, delay);
        }
    }

    fn on_rejected(&self, operation: &str) {
        for o in &self.observers {
            o.on_rejected(operation);
        }
    }

    fn on_timeout(&self, operation: &str, limit: Duration) {
        for o in &self.observers {
            o.on_timeout(operation, limit);
        }
    }

    fn on_fallback(&self, operation: &str, primary_kind: FailureKind) {
        for o in &self.observers {
            o.on_fallback(operation, primary_kind);
        }
    }
}
