//! Failure taxonomy shared by every resilience layer.
//!
//! # Kinds
//! - Retryable: transient, safe to attempt again
//! - NonRetryable: permanent (malformed request, rejected input)
//! - CircuitOpen: rejected without attempting, breaker is open
//! - Timeout: attempt exceeded its allotted time
//!
//! # Design Decisions
//! - Layers pass `ResilienceError<E>` to each other and propagate with `?`
//! - Classification is a pure policy object, injectable per call
//! - The boundary type is `ClassifiedFailure<E>`, which already carries its kind

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Policy-relevant category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Retryable,
    NonRetryable,
    CircuitOpen,
    Timeout,
}

impl FailureKind {
    /// Whether the retry executor may attempt the operation again.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Retryable | FailureKind::Timeout)
    }

    /// Whether a failure of this kind counts against a circuit breaker.
    ///
    /// Only failures that say something about the dependency's health are watched.
    /// A rejected request proves the dependency answered; a nested open breaker was
    /// already counted where it opened.
    pub fn trips_breaker(self) -> bool {
        matches!(self, FailureKind::Retryable | FailureKind::Timeout)
    }

    /// User-facing disposition of a failure of this kind.
    pub fn disposition(self) -> Disposition {
        match self {
            FailureKind::NonRetryable => Disposition::InvalidRequest,
            FailureKind::Retryable | FailureKind::CircuitOpen | FailureKind::Timeout => {
                Disposition::ServiceUnavailable
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Retryable => "retryable",
            FailureKind::NonRetryable => "non-retryable",
            FailureKind::CircuitOpen => "circuit-open",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// What the caller should tell its own user once every strategy is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// "Service temporarily unavailable": try again later.
    ServiceUnavailable,
    /// "Invalid request": retrying the same input will not help.
    InvalidRequest,
}

/// Error passed between resilience layers.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// Breaker for the operation is open; the operation was not invoked.
    #[error("circuit breaker for `{operation}` is open")]
    CircuitOpen { operation: String },

    /// Attempt did not complete in time and was cancelled.
    #[error("`{operation}` timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    /// The caller gave up (cancellation token fired or the runtime is shutting down).
    ///
    /// Classified as a timeout for the caller, but says nothing about the dependency.
    #[error("`{operation}` cancelled by caller")]
    Cancelled { operation: String },

    /// Failure explicitly tagged as permanent by the operation.
    #[error("{0}")]
    Permanent(E),

    /// Raw failure from the operation, classified by policy.
    #[error("{0}")]
    Inner(E),
}

impl<E> ResilienceError<E> {
    /// Tag an operation failure as permanent so no layer retries it.
    pub fn permanent(error: E) -> Self {
        ResilienceError::Permanent(error)
    }

    /// Underlying operation error, if the failure came from the operation itself.
    pub fn inner(&self) -> Option<&E> {
        match self {
            ResilienceError::Permanent(e) | ResilienceError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller abandoned the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResilienceError::Cancelled { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            ResilienceError::Permanent(e) | ResilienceError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// Classification policy.
///
/// Any `Fn(&ResilienceError<E>) -> FailureKind` closure is a classifier.
pub trait Classify<E>: Send + Sync {
    fn classify(&self, error: &ResilienceError<E>) -> FailureKind;
}

impl<E, F> Classify<E> for F
where
    F: Fn(&ResilienceError<E>) -> FailureKind + Send + Sync,
{
    fn classify(&self, error: &ResilienceError<E>) -> FailureKind {
        self(error)
    }
}

/// Default policy: tags decide, everything untagged is retryable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E> Classify<E> for DefaultClassifier {
    fn classify(&self, error: &ResilienceError<E>) -> FailureKind {
        match error {
            ResilienceError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            ResilienceError::Timeout { .. } | ResilienceError::Cancelled { .. } => {
                FailureKind::Timeout
            }
            ResilienceError::Permanent(_) => FailureKind::NonRetryable,
            ResilienceError::Inner(_) => FailureKind::Retryable,
        }
    }
}

/// Applies the default policy to core failures and a caller rule to raw operation errors.
///
/// Tagged failures (`Permanent`, `CircuitOpen`, `Timeout`) keep their default kind.
pub struct InnerClassifier<F> {
    rule: F,
}

impl<F> InnerClassifier<F> {
    pub fn new(rule: F) -> Self {
        Self { rule }
    }
}

impl<E, F> Classify<E> for InnerClassifier<F>
where
    F: Fn(&E) -> FailureKind + Send + Sync,
{
    fn classify(&self, error: &ResilienceError<E>) -> FailureKind {
        match error {
            ResilienceError::Inner(e) => (self.rule)(e),
            other => DefaultClassifier.classify(other),
        }
    }
}

/// Failure surfaced to callers once the resilience layers gave up.
#[derive(Debug, Error)]
#[error("{operation} failed ({kind}): {cause}")]
pub struct ClassifiedFailure<E> {
    pub kind: FailureKind,
    pub operation: String,
    pub cause: ResilienceError<E>,
}

impl<E> ClassifiedFailure<E> {
    pub fn new(operation: impl Into<String>, kind: FailureKind, cause: ResilienceError<E>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            cause,
        }
    }

    /// Classify `cause` with `classifier` and wrap it.
    pub fn classify(
        operation: impl Into<String>,
        classifier: &dyn Classify<E>,
        cause: ResilienceError<E>,
    ) -> Self {
        let kind = classifier.classify(&cause);
        Self::new(operation, kind, cause)
    }

    pub fn disposition(&self) -> Disposition {
        self.kind.disposition()
    }
}
