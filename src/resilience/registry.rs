//! Breaker registry.
//!
//! # Responsibilities
//! - Own one breaker per operation key for the life of the process
//! - Create breakers lazily on first use, or up front through `register`
//! - Expose snapshots for status output
//!
//! # Design Decisions
//! - Constructed once by the composition root and passed around (no globals)
//! - DashMap sharding keeps lookups off a single lock; breaker state has its own mutex

use std::sync::Arc;
use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::observability::observer::{self, ResilienceObserver};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};

pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: BreakerConfig,
    observer: Arc<dyn ResilienceObserver>,
}

impl BreakerRegistry {
    pub fn new(defaults: BreakerConfig) -> Self {
        Self::with_observer(defaults, observer::noop())
    }

    pub fn with_observer(defaults: BreakerConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            observer,
        }
    }

    pub fn defaults(&self) -> &BreakerConfig {
        &self.defaults
    }

    /// Register a breaker for `operation` with explicit settings.
    ///
    /// Replaces any breaker already registered under that key, discarding its state.
    pub fn register(&self, operation: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        let breaker = Arc::new(CircuitBreaker::with_observer(
            operation,
            config,
            self.observer.clone(),
        ));
        if self
            .breakers
            .insert(operation.to_string(), breaker.clone())
            .is_some()
        {
            tracing::info!(operation = %operation, "Replaced registered circuit breaker");
        }
        breaker
    }

    /// Breaker for `operation`, created with the default settings on first use.
    pub fn breaker(&self, operation: &str) -> Arc<CircuitBreaker> {
        self.breaker_or_insert(operation, || self.defaults.clone())
    }

    /// Breaker for `operation`, created with `config` on first use.
    ///
    /// An existing breaker keeps its original settings and state.
    pub fn breaker_or_insert<F>(&self, operation: &str, config: F) -> Arc<CircuitBreaker>
    where
        F: FnOnce() -> BreakerConfig,
    {
        if let Some(existing) = self.breakers.get(operation) {
            return existing.clone();
        }

        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                tracing::debug!(operation = %operation, "Creating circuit breaker");
                Arc::new(CircuitBreaker::with_observer(
                    operation,
                    config(),
                    self.observer.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, operation: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(operation).map(|b| b.clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshots of every breaker, sorted by operation name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> =
            self.breakers.iter().map(|entry| entry.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.operation.cmp(&b.operation));
        snapshots
    }

    /// Force every breaker back to Closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.breakers.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use crate::resilience::errors::ResilienceError;
    use std::time::Duration;

    #[test]
    fn test_same_key_same_breaker() {
        let registry = BreakerRegistry::default();
        let a = registry.breaker("transcription");
        let b = registry.breaker("transcription");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("story").is_none());
    }

    #[test]
    fn test_first_config_wins() {
        let registry = BreakerRegistry::default();
        let first = registry.breaker_or_insert("export", || BreakerConfig::new(2, Duration::from_secs(5)));
        let second = registry.breaker_or_insert("export", || BreakerConfig::new(9, Duration::from_secs(9)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().failure_threshold, 2);
    }

    #[tokio::test]
    async fn test_register_replaces_and_snapshots_sorted() {
        let registry = BreakerRegistry::default();
        registry.breaker("story");
        let transcription = registry.register("transcription", BreakerConfig::new(1, Duration::from_secs(60)));

        let _ = transcription
            .call(|| async { Err::<(), _>(ResilienceError::Inner("down")) })
            .await;

        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].operation, "story");
        assert_eq!(snapshots[1].state, CircuitState::Open);

        registry.reset_all();
        assert_eq!(registry.breaker("transcription").state(), CircuitState::Closed);
    }
}
