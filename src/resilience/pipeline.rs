//! Explicit composition of the resilience layers.
//!
//! ```text
//! call(key, op)
//!     → CircuitBreaker[key]      (may reject without running anything)
//!         → RetryExecutor        (full backoff schedule, reported to the breaker once)
//!             → TimeoutGuard     (per attempt)
//!                 → op()
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::errors::{ClassifiedFailure, Classify, DefaultClassifier, ResilienceError};
use crate::resilience::fallback::FallbackExecutor;
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::RetryExecutor;
use crate::resilience::timeouts::TimeoutGuard;

/// Per-call policy.
pub struct CallOptions<E> {
    pub retry: RetryConfig,
    pub timeout: Duration,
    pub classifier: Arc<dyn Classify<E>>,
    pub cancel: Option<CancellationToken>,
    pub deadline: Option<Instant>,
}

impl<E> CallOptions<E> {
    /// Options using the default classifier.
    pub fn new(retry: RetryConfig, timeout: Duration) -> Self {
        Self {
            retry,
            timeout,
            classifier: Arc::new(DefaultClassifier),
            cancel: None,
            deadline: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classify<E>>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl<E> Clone for CallOptions<E> {
    fn clone(&self) -> Self {
        Self {
            retry: self.retry.clone(),
            timeout: self.timeout,
            classifier: self.classifier.clone(),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }
}

/// Composition root: owns the breaker registry and builds the layer stack per call.
#[derive(Clone)]
pub struct Resilience {
    registry: Arc<BreakerRegistry>,
    observer: Arc<dyn ResilienceObserver>,
}

impl Resilience {
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self::with_observer(registry, observer::noop())
    }

    /// The observer receives retry, timeout and fallback events; breaker events go to
    /// the registry's own observer.
    pub fn with_observer(registry: Arc<BreakerRegistry>, observer: Arc<dyn ResilienceObserver>) -> Self {
        Self { registry, observer }
    }

    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Run `operation` under the breaker for `key` with the default classifier.
    pub async fn call<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
        retry: &RetryConfig,
        timeout: Duration,
    ) -> Result<T, ClassifiedFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let options = CallOptions::new(retry.clone(), timeout);
        self.execute(key, &options, operation).await
    }

    /// Run `operation` under the breaker for `key` with explicit options.
    pub async fn execute<F, Fut, T, E>(
        &self,
        key: &str,
        options: &CallOptions<E>,
        operation: F,
    ) -> Result<T, ClassifiedFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let breaker = self.registry.breaker(key);
        self.execute_on(&breaker, options, operation).await
    }

    /// Run `operation` through an already resolved breaker.
    pub async fn execute_on<F, Fut, T, E>(
        &self,
        breaker: &CircuitBreaker,
        options: &CallOptions<E>,
        mut operation: F,
    ) -> Result<T, ClassifiedFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let key = breaker.operation();
        let span = tracing::info_span!("resilient_call", operation = %key, call_id = %Uuid::new_v4());

        let mut guard = TimeoutGuard::new(options.timeout).with_observer(self.observer.clone());
        let mut retry = RetryExecutor::new(key, options.retry.clone()).with_observer(self.observer.clone());
        if let Some(deadline) = options.deadline {
            guard = guard.with_deadline(deadline);
            retry = retry.with_deadline(deadline);
        }
        if let Some(token) = &options.cancel {
            guard = guard.with_cancellation(token.clone());
            retry = retry.with_cancellation(token.clone());
        }

        let classifier = options.classifier.as_ref();
        let guard = &guard;
        let retry = &retry;
        let op = &mut operation;

        let result = breaker
            .call_with(classifier, move || {
                retry.run_with(classifier, move || guard.run(key, op()))
            })
            .instrument(span)
            .await;

        result.map_err(|cause| ClassifiedFailure::classify(key, classifier, cause))
    }

    /// Fallback sequencing that reports to this pipeline's observer.
    pub fn fallback(&self, operation: &str) -> FallbackExecutor {
        FallbackExecutor::new(operation).with_observer(self.observer.clone())
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::new(Arc::new(BreakerRegistry::default()))
    }
}

impl std::fmt::Debug for Resilience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resilience")
            .field("registry", &self.registry)
            .finish()
    }
}
