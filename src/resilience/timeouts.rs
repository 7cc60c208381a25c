//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the wall-clock duration of a single attempt
//! - Cancel the attempt on expiry (the future is dropped, closing its connection)
//! - Honor a caller deadline and cancellation token
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Blocking work runs on the blocking pool and is abandoned, not awaited, on expiry

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::errors::ResilienceError;

/// Per-attempt time limit.
#[derive(Clone)]
pub struct TimeoutGuard {
    limit: Duration,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    observer: Arc<dyn ResilienceObserver>,
}

impl TimeoutGuard {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            deadline: None,
            cancel: None,
            observer: observer::noop(),
        }
    }

    /// Absolute deadline of the caller; attempts never run past it.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancellation token of the caller; cancelling it aborts the running attempt.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Limit for an attempt starting now: the configured limit, shortened by the deadline.
    pub fn effective_limit(&self) -> Duration {
        match self.deadline {
            Some(deadline) => self
                .limit
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.limit,
        }
    }

    fn timed_out<E>(&self, operation: &str, limit: Duration) -> ResilienceError<E> {
        tracing::warn!(operation = %operation, limit = ?limit, "Attempt timed out");
        self.observer.on_timeout(operation, limit);
        ResilienceError::Timeout {
            operation: operation.to_string(),
            limit,
        }
    }

    /// Await `attempt` for at most the effective limit.
    ///
    /// On expiry the attempt is dropped and `Timeout` is returned; on caller
    /// cancellation it is dropped and `Cancelled` is returned.
    pub async fn run<Fut, T, E>(&self, operation: &str, attempt: Fut) -> Result<T, ResilienceError<E>>
    where
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        let limit = self.effective_limit();
        if limit.is_zero() {
            return Err(self.timed_out(operation, limit));
        }

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                tracing::debug!(operation = %operation, "Attempt cancelled by caller");
                Err(ResilienceError::Cancelled {
                    operation: operation.to_string(),
                })
            }
            result = tokio::time::timeout(limit, attempt) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(self.timed_out(operation, limit)),
            },
        }
    }

    /// Run synchronous work on the blocking pool, returning after at most the effective limit.
    ///
    /// The work itself cannot be interrupted; on expiry its result is discarded.
    pub async fn run_blocking<F, T, E>(&self, operation: &str, work: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(work);
        let name = operation.to_string();
        self.run(operation, async move {
            match handle.await {
                Ok(result) => result.map_err(ResilienceError::Inner),
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                // runtime shutting down
                Err(_) => Err(ResilienceError::Cancelled { operation: name }),
            }
        })
        .await
    }
}

impl std::fmt::Debug for TimeoutGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutGuard")
            .field("limit", &self.limit)
            .field("deadline", &self.deadline)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_limit() {
        let guard = TimeoutGuard::new(Duration::from_secs(5));
        let result: Result<u8, ResilienceError<()>> = guard
            .run("export", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(1)
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_cancels_attempt() {
        struct SetOnDrop(Arc<AtomicBool>);
        impl Drop for SetOnDrop {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let marker = SetOnDrop(dropped.clone());
        let guard = TimeoutGuard::new(Duration::from_secs(2));
        let start = Instant::now();

        let result: Result<(), ResilienceError<()>> = guard
            .run("export", async move {
                let _marker = marker;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(ResilienceError::Timeout { ref operation, limit }) if operation == "export" && limit == Duration::from_secs(2)
        ));
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(2010));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shortens_limit() {
        let guard = TimeoutGuard::new(Duration::from_secs(30))
            .with_deadline(Instant::now() + Duration::from_secs(3));
        assert_eq!(guard.effective_limit(), Duration::from_secs(3));

        let expired = TimeoutGuard::new(Duration::from_secs(30)).with_deadline(Instant::now());
        let result: Result<(), ResilienceError<()>> = expired.run("export", async { Ok(()) }).await;
        assert!(matches!(result, Err(ResilienceError::Timeout { limit, .. }) if limit.is_zero()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_token_aborts_attempt() {
        let token = CancellationToken::new();
        let guard = TimeoutGuard::new(Duration::from_secs(30)).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        let start = Instant::now();
        let result: Result<(), ResilienceError<()>> = guard
            .run("export", async {
                tokio::time::sleep(Duration::from_secs(20)).await;
                Ok(())
            })
            .await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(ResilienceError::Cancelled { ref operation }) if operation == "export"));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_wins_over_ready_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = TimeoutGuard::new(Duration::from_secs(30)).with_cancellation(token);

        for _ in 0..16 {
            let result: Result<(), ResilienceError<()>> = guard.run("export", async { Ok(()) }).await;
            assert!(matches!(result, Err(ResilienceError::Cancelled { .. })));
        }
    }

    #[tokio::test]
    async fn test_blocking_work_is_abandoned_on_expiry() {
        let guard = TimeoutGuard::new(Duration::from_millis(50));
        let start = std::time::Instant::now();
        let result: Result<(), ResilienceError<String>> = guard
            .run_blocking("render", || {
                std::thread::sleep(std::time::Duration::from_millis(500));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::Timeout { .. })));
        assert!(start.elapsed() < std::time::Duration::from_millis(400));

        let ok: Result<u32, ResilienceError<String>> =
            guard.run_blocking("render", || Ok(3)).await;
        assert_eq!(ok.unwrap(), 3);

        let err: Result<u32, ResilienceError<String>> =
            guard.run_blocking("render", || Err("disk full".to_string())).await;
        assert!(matches!(err, Err(ResilienceError::Inner(ref e)) if e == "disk full"));
    }
}
