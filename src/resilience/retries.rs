//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke a failed operation with exponential backoff + jitter
//! - Stop on success, on a non-retryable or circuit-open failure, or when attempts run out
//! - Stop sleeping when the caller cancels
//! - Give up early when the next delay would overrun the caller's deadline
//!
//! # Design Decisions
//! - Classification decides retryability; timeouts are retried unless reclassified
//! - No delay after the final attempt
//! - The sleep between attempts touches no shared state and holds no lock
//! - Never converts a failure into a success

use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::backoff::Backoff;
use crate::resilience::errors::{Classify, DefaultClassifier, FailureKind, ResilienceError};

/// Runs an operation under a [`RetryConfig`].
#[derive(Clone)]
pub struct RetryExecutor {
    operation: String,
    config: RetryConfig,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    observer: Arc<dyn ResilienceObserver>,
}

impl RetryExecutor {
    pub fn new(operation: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            operation: operation.into(),
            config,
            cancel: None,
            deadline: None,
            observer: observer::noop(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Abandon the remaining schedule once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Do not start a delay that would end at or past `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` with the default classifier.
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        self.run_with(&DefaultClassifier, operation).await
    }

    /// Run `operation` until it succeeds or the policy gives up.
    ///
    /// The operation is invoked at most `max_attempts` times (at least once).
    pub async fn run_with<F, Fut, T, E>(
        &self,
        classifier: &dyn Classify<E>,
        mut operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let backoff = Backoff::from_config(&self.config);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.observer.on_attempt(&self.operation, attempt);

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = %self.operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.is_cancelled() {
                return Err(error);
            }

            let kind = classifier.classify(&error);
            if matches!(kind, FailureKind::NonRetryable | FailureKind::CircuitOpen) {
                tracing::debug!(operation = %self.operation, attempt, kind = %kind, "Not retrying");
                return Err(error);
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    operation = %self.operation,
                    attempts = attempt,
                    kind = %kind,
                    "Retry attempts exhausted"
                );
                return Err(error);
            }

            let delay = backoff.delay(attempt);
            if let Some(deadline) = self.deadline {
                if Instant::now() + delay >= deadline {
                    tracing::debug!(
                        operation = %self.operation,
                        attempt,
                        delay = ?delay,
                        "Next retry would overrun the deadline"
                    );
                    return Err(error);
                }
            }

            tracing::info!(operation = %self.operation, attempt, kind = %kind, delay = ?delay, "Retrying operation");
            self.observer.on_retry(&self.operation, attempt, kind, delay);

            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            tracing::debug!(operation = %self.operation, attempt, "Retry schedule cancelled");
                            return Err(error);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }

            attempt += 1;
        }
    }
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("operation", &self.operation)
            .field("config", &self.config)
            .field("deadline", &self.deadline)
            .finish()
    }
}
