//! Primary/secondary composition.
//!
//! The only layer that recovers from a failure, and only by substituting the
//! secondary's result. It adds no retries: wrap either side in the pipeline first if
//! it needs them.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::errors::{ClassifiedFailure, Disposition, FailureKind};

/// Both strategies failed.
#[derive(Debug, Error)]
#[error("service unavailable: primary failed ({primary}); fallback failed ({secondary})")]
pub struct FallbackFailure<P, S> {
    pub primary: P,
    pub secondary: S,
}

impl<P, S> FallbackFailure<P, S> {
    /// Aggregate failures are always reported as the service being unavailable.
    pub fn disposition(&self) -> Disposition {
        Disposition::ServiceUnavailable
    }
}

/// Failure kind reported by a strategy, used for logging and hooks.
pub trait FailureSummary {
    fn failure_kind(&self) -> FailureKind;
}

impl<E> FailureSummary for ClassifiedFailure<E> {
    fn failure_kind(&self) -> FailureKind {
        self.kind
    }
}

impl<P: FailureSummary, S: FailureSummary> FallbackFailure<P, S> {
    pub fn primary_kind(&self) -> FailureKind {
        self.primary.failure_kind()
    }

    pub fn secondary_kind(&self) -> FailureKind {
        self.secondary.failure_kind()
    }
}

/// Sequences a primary strategy and its fallback.
#[derive(Clone)]
pub struct FallbackExecutor {
    operation: String,
    observer: Arc<dyn ResilienceObserver>,
}

impl FallbackExecutor {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            observer: observer::noop(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `primary`; if it fails run `secondary`; if both fail return both causes.
    pub async fn with_fallback<P, PF, S, SF, T, EP, ES>(
        &self,
        primary: P,
        secondary: S,
    ) -> Result<T, FallbackFailure<EP, ES>>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T, EP>>,
        S: FnOnce() -> SF,
        SF: Future<Output = Result<T, ES>>,
        EP: FailureSummary + std::fmt::Display,
    {
        let primary_error = match primary().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let kind = primary_error.failure_kind();
        tracing::warn!(
            operation = %self.operation,
            kind = %kind,
            error = %primary_error,
            "Primary strategy failed, invoking fallback"
        );
        self.observer.on_fallback(&self.operation, kind);

        match secondary().await {
            Ok(value) => Ok(value),
            Err(secondary_error) => {
                tracing::error!(operation = %self.operation, "Fallback strategy failed too");
                Err(FallbackFailure {
                    primary: primary_error,
                    secondary: secondary_error,
                })
            }
        }
    }

    /// Run `primary`, substituting `default` on failure.
    pub async fn with_default<P, PF, T, EP>(&self, primary: P, default: T) -> T
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T, EP>>,
        EP: FailureSummary + std::fmt::Display,
    {
        let result: Result<T, FallbackFailure<EP, std::convert::Infallible>> = self
            .with_fallback(primary, || async move { Ok(default) })
            .await;
        match result {
            Ok(value) => value,
            Err(failure) => match failure.secondary {},
        }
    }
}

impl std::fmt::Debug for FallbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackExecutor")
            .field("operation", &self.operation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::observer::recording::{Event, RecordingObserver};
    use crate::resilience::errors::ResilienceError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failure(kind: FailureKind, msg: &'static str) -> ClassifiedFailure<&'static str> {
        let cause = match kind {
            FailureKind::NonRetryable => ResilienceError::Permanent(msg),
            _ => ResilienceError::Inner(msg),
        };
        ClassifiedFailure::new("story", kind, cause)
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let executor = FallbackExecutor::new("story");
        let secondary_calls = AtomicU32::new(0);
        let result = executor
            .with_fallback(
                || async { Ok::<_, ClassifiedFailure<&str>>("generated") },
                || async {
                    secondary_calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ClassifiedFailure<&str>>("template")
                },
            )
            .await;
        assert_eq!(result.unwrap(), "generated");
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_secondary_value_replaces_failure() {
        let observer = Arc::new(RecordingObserver::default());
        let executor = FallbackExecutor::new("story").with_observer(observer.clone());
        let result = executor
            .with_fallback(
                || async { Err::<&str, _>(failure(FailureKind::Retryable, "model overloaded")) },
                || async { Ok::<_, ClassifiedFailure<&str>>("template story") },
            )
            .await;
        assert_eq!(result.unwrap(), "template story");
        assert_eq!(observer.events(), vec![Event::Fallback(FailureKind::Retryable)]);
    }

    #[tokio::test]
    async fn test_both_failures_are_aggregated() {
        let executor = FallbackExecutor::new("story");
        let result: Result<&str, _> = executor
            .with_fallback(
                || async { Err(failure(FailureKind::CircuitOpen, "primary down")) },
                || async { Err(failure(FailureKind::NonRetryable, "secondary rejected")) },
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.primary_kind(), FailureKind::CircuitOpen);
        assert_eq!(err.secondary_kind(), FailureKind::NonRetryable);
        assert_eq!(err.disposition(), Disposition::ServiceUnavailable);
        let message = err.to_string();
        assert!(message.contains("primary down"), "{}", message);
        assert!(message.contains("secondary rejected"), "{}", message);
    }

    #[tokio::test]
    async fn test_with_default() {
        let executor = FallbackExecutor::new("export");
        let value = executor
            .with_default(
                || async { Err::<Vec<u8>, _>(failure(FailureKind::Timeout, "slow")) },
                Vec::new(),
            )
            .await;
        assert!(value.is_empty());
    }
}
