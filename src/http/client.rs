//! Resilient outbound client.
//!
//! # Responsibilities
//! - Resolve the breaker, retry policy and timeout for a named operation
//! - Run each request through the resilience pipeline
//! - Apply reloaded configuration to subsequent calls
//!
//! # Design Decisions
//! - One breaker per operation name, shared by every caller of the client
//! - The live config sits behind an ArcSwap; a call reads it once at the start
//! - Breakers keep their thresholds and state across reloads
//! - No fallback here; callers compose one with `fallback()` if they have one

use std::sync::Arc;
use arc_swap::ArcSwap;
use reqwest::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ResilienceConfig;
use crate::http::request::OutboundRequest;
use crate::http::response::OutboundResponse;
use crate::http::transport::{HttpClassifier, ReqwestTransport, Transport, TransportError};
use crate::observability::observer::ResilienceObserver;
use crate::resilience::circuit_breaker::BreakerSnapshot;
use crate::resilience::errors::{ClassifiedFailure, FailureKind, ResilienceError};
use crate::resilience::fallback::FallbackExecutor;
use crate::resilience::pipeline::{CallOptions, Resilience};
use crate::resilience::registry::BreakerRegistry;

/// Outbound HTTP client with per-operation breakers, retries and timeouts.
pub struct ResilientClient<T: Transport = ReqwestTransport> {
    transport: Arc<T>,
    resilience: Resilience,
    config: Arc<ArcSwap<ResilienceConfig>>,
}

impl ResilientClient<ReqwestTransport> {
    /// Client over a default `reqwest` transport.
    pub fn new(config: ResilienceConfig) -> Self {
        Self::with_transport(ReqwestTransport::new(), config)
    }
}

impl<T: Transport> ResilientClient<T> {
    pub fn with_transport(transport: T, config: ResilienceConfig) -> Self {
        let registry = Arc::new(BreakerRegistry::new(config.breaker.clone()));
        Self {
            transport: Arc::new(transport),
            resilience: Resilience::new(registry),
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Route breaker and call events to `observer`.
    ///
    /// Replaces the breaker registry, so call this before issuing requests.
    pub fn with_observer(mut self, observer: Arc<dyn ResilienceObserver>) -> Self {
        let defaults = self.config.load().breaker.clone();
        let registry = Arc::new(BreakerRegistry::with_observer(defaults, observer.clone()));
        self.resilience = Resilience::with_observer(registry, observer);
        self
    }

    /// Share an existing pipeline (and its breakers) with other clients.
    pub fn with_resilience(mut self, resilience: Resilience) -> Self {
        self.resilience = resilience;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<ResilienceConfig> {
        self.config.load_full()
    }

    /// Swap the live configuration.
    ///
    /// Retry and timeout changes apply to the next call. Breakers already created keep
    /// their settings; new operation names pick up the new ones.
    pub fn apply_config(&self, config: ResilienceConfig) {
        tracing::info!(operations = config.operations.len(), "Applying resilience config");
        self.config.store(Arc::new(config));
    }

    /// Apply every config received on `updates` until the sender goes away.
    pub fn spawn_config_updates(
        &self,
        mut updates: mpsc::UnboundedReceiver<ResilienceConfig>,
    ) -> JoinHandle<()> {
        let live = self.config.clone();
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                tracing::info!(operations = config.operations.len(), "Resilience config reloaded");
                live.store(Arc::new(config));
            }
            tracing::debug!("Config update channel closed");
        })
    }

    /// Issue `method target` as the named operation.
    pub async fn request(
        &self,
        operation: &str,
        method: Method,
        target: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<OutboundResponse, ClassifiedFailure<TransportError>> {
        self.send(operation, method, target, payload, None).await
    }

    /// Like [`request`](Self::request), abandoning the call once `cancel` fires.
    ///
    /// A cancelled call fails with a timeout-kind failure.
    pub async fn request_cancellable(
        &self,
        operation: &str,
        method: Method,
        target: &str,
        payload: Option<serde_json::Value>,
        cancel: CancellationToken,
    ) -> Result<OutboundResponse, ClassifiedFailure<TransportError>> {
        self.send(operation, method, target, payload, Some(cancel)).await
    }

    /// Fallback sequencing reporting to this client's observer.
    pub fn fallback(&self, operation: &str) -> FallbackExecutor {
        self.resilience.fallback(operation)
    }

    /// Breaker state for every operation seen so far.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.resilience.registry().snapshots()
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        target: &str,
        payload: Option<serde_json::Value>,
        cancel: Option<CancellationToken>,
    ) -> Result<OutboundResponse, ClassifiedFailure<TransportError>> {
        let request = OutboundRequest::new(method, target, payload).map_err(|e| {
            tracing::warn!(operation = %operation, error = %e, "Rejected outbound request");
            ClassifiedFailure::new(operation, FailureKind::NonRetryable, ResilienceError::Permanent(e))
        })?;

        let config = self.config.load_full();
        let breaker = self
            .resilience
            .registry()
            .breaker_or_insert(operation, || config.breaker_for(operation));

        let mut options: CallOptions<TransportError> =
            CallOptions::new(config.retry_for(operation), config.timeout_for(operation))
                .with_classifier(Arc::new(HttpClassifier));
        if let Some(token) = cancel {
            options = options.with_cancellation(token);
        }
        drop(config);

        tracing::debug!(
            operation = %operation,
            method = %request.method,
            url = %request.url,
            "Sending outbound request"
        );

        let transport = &self.transport;
        self.resilience
            .execute_on(&breaker, &options, || {
                let transport = Arc::clone(transport);
                let request = request.clone();
                async move { transport.send(request).await.map_err(ResilienceError::Inner) }
            })
            .await
    }
}

impl<T: Transport> Clone for ResilientClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            resilience: self.resilience.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport> std::fmt::Debug for ResilientClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("resilience", &self.resilience)
            .finish()
    }
}
