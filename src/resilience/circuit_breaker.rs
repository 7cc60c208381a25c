//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one probe call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive watched failures >= failure_threshold
//! Open → Half-Open: first call after recovery_timeout (lazy, no timer)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (threshold ignored)
//! ```
//!
//! # Design Decisions
//! - Per-operation breaker (not global), owned by the registry
//! - Fail fast in Open state (operation is never invoked)
//! - Single probe in Half-Open; concurrent callers are rejected while it runs
//! - One mutex per breaker; never held across an await
//! - The breaker only gates and counts: it never retries and never swallows errors

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::errors::{Classify, DefaultClassifier, ResilienceError};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub operation: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Time since the most recent watched failure, if any.
    pub since_last_failure: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

type Transition = Option<(CircuitState, CircuitState)>;

impl BreakerInner {
    fn set_state(&mut self, to: CircuitState) -> Transition {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        Some((from, to))
    }
}

/// How an admitted call ended, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    /// Failure that says something about the dependency's health.
    Watched,
    /// Failure the breaker does not count (a rejected request, a cancelled call).
    Neutral,
}

/// Per-operation circuit breaker.
pub struct CircuitBreaker {
    operation: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    observer: Arc<dyn ResilienceObserver>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(operation: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_observer(operation, config, observer::noop())
    }

    pub fn with_observer(
        operation: impl Into<String>,
        config: BreakerConfig,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        Self {
            operation: operation.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
            observer,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    // Critical sections never panic, so a poisoned lock still holds consistent state.
    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, as recorded. An expired Open state moves to Half-Open on the next call.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            operation: self.operation.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            since_last_failure: inner.last_failure.map(|t| t.elapsed()),
        }
    }

    /// Force the breaker back to Closed and clear its counters.
    pub fn reset(&self) {
        let transition = {
            let mut inner = self.lock();
            inner.failure_count = 0;
            inner.last_failure = None;
            inner.probe_in_flight = false;
            inner.set_state(CircuitState::Closed)
        };
        tracing::info!(operation = %self.operation, "Circuit breaker manually reset");
        self.announce(transition);
    }

    /// Run `operation` through the breaker using the default classifier.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        self.call_with(&DefaultClassifier, operation).await
    }

    /// Run `operation` through the breaker.
    ///
    /// `classifier` decides which failures count against the breaker (see
    /// [`FailureKind::trips_breaker`](crate::resilience::FailureKind::trips_breaker)).
    /// Caller cancellations are never counted. Every failure is returned to the caller
    /// unchanged.
    pub async fn call_with<F, Fut, T, E>(
        &self,
        classifier: &dyn Classify<E>,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let Some(permit) = self.try_acquire() else {
            tracing::debug!(operation = %self.operation, "Circuit open, rejecting call");
            self.observer.on_rejected(&self.operation);
            return Err(ResilienceError::CircuitOpen {
                operation: self.operation.clone(),
            });
        };

        match operation().await {
            Ok(value) => {
                permit.settle(Outcome::Success);
                Ok(value)
            }
            Err(e) => {
                // An abandoned call says nothing about the dependency.
                let outcome = if e.is_cancelled() {
                    Outcome::Neutral
                } else if classifier.classify(&e).trips_breaker() {
                    Outcome::Watched
                } else {
                    Outcome::Neutral
                };
                permit.settle(outcome);
                Err(e)
            }
        }
    }

    /// Admission check. Check-then-transition happens under one lock so only one
    /// caller can own the half-open probe.
    fn try_acquire(&self) -> Option<Permit<'_>> {
        let (permit, transition) = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => (Some(false), None),
                CircuitState::Open => {
                    let expired = inner
                        .last_failure
                        .map_or(true, |t| t.elapsed() >= self.config.recovery_timeout());
                    if expired {
                        inner.probe_in_flight = true;
                        (Some(true), inner.set_state(CircuitState::HalfOpen))
                    } else {
                        (None, None)
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.probe_in_flight {
                        (None, None)
                    } else {
                        inner.probe_in_flight = true;
                        (Some(true), None)
                    }
                }
            }
        };
        self.announce(transition);

        permit.map(|probe| Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    fn record(&self, probe: bool, outcome: Outcome) {
        let transition = {
            let mut inner = self.lock();
            if probe {
                inner.probe_in_flight = false;
            }

            match outcome {
                Outcome::Success => match inner.state {
                    CircuitState::Closed => {
                        inner.failure_count = 0;
                        None
                    }
                    CircuitState::HalfOpen if probe => {
                        inner.failure_count = 0;
                        inner.set_state(CircuitState::Closed)
                    }
                    // Late success from a call admitted before the breaker tripped.
                    _ => None,
                },
                Outcome::Watched => {
                    inner.failure_count = inner.failure_count.saturating_add(1);
                    inner.last_failure = Some(Instant::now());
                    match inner.state {
                        CircuitState::HalfOpen => inner.set_state(CircuitState::Open),
                        CircuitState::Closed
                            if inner.failure_count >= self.config.failure_threshold =>
                        {
                            inner.set_state(CircuitState::Open)
                        }
                        _ => None,
                    }
                }
                Outcome::Neutral => None,
            }
        };
        self.announce(transition);
    }

    /// Release a probe whose caller went away before it finished.
    fn abandon_probe(&self) {
        self.lock().probe_in_flight = false;
        tracing::debug!(operation = %self.operation, "Half-open probe cancelled");
    }

    fn announce(&self, transition: Transition) {
        let Some((from, to)) = transition else {
            return;
        };
        match to {
            CircuitState::Open => tracing::warn!(
                operation = %self.operation,
                from = ?from,
                threshold = self.config.failure_threshold,
                recovery_timeout = ?self.config.recovery_timeout(),
                "Circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                operation = %self.operation,
                "Circuit breaker half-open, probing dependency"
            ),
            CircuitState::Closed => tracing::info!(
                operation = %self.operation,
                from = ?from,
                "Circuit breaker closed"
            ),
        }
        self.observer.on_state_change(&self.operation, from, to);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("operation", &self.operation)
            .field("config", &self.config)
            .field("inner", &*self.lock())
            .finish()
    }
}

/// Admission to run one call. Dropping an unsettled probe permit releases the probe slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.record(self.probe, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.abandon_probe();
        }
    }
}
