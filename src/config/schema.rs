//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resilience layer.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Root configuration for the resilience layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Default circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Default retry policy.
    pub retry: RetryConfig,

    /// Default per-attempt timeout.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Per-operation overrides, keyed by operation name.
    pub operations: HashMap<String, OperationConfig>,
}

impl ResilienceConfig {
    /// Breaker settings for `operation`, falling back to the defaults.
    pub fn breaker_for(&self, operation: &str) -> BreakerConfig {
        self.operations
            .get(operation)
            .and_then(|op| op.breaker.clone())
            .unwrap_or_else(|| self.breaker.clone())
    }

    /// Retry policy for `operation`, falling back to the defaults.
    pub fn retry_for(&self, operation: &str) -> RetryConfig {
        self.operations
            .get(operation)
            .and_then(|op| op.retry.clone())
            .unwrap_or_else(|| self.retry.clone())
    }

    /// Per-attempt timeout for `operation`, falling back to the defaults.
    pub fn timeout_for(&self, operation: &str) -> Duration {
        self.operations
            .get(operation)
            .and_then(|op| op.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.timeouts.attempt())
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// Time an open breaker waits before allowing a probe, in milliseconds.
    pub recovery_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout_ms: u64::try_from(recovery_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub exponential_factor: f64,

    /// Randomize each delay into [50%, 100%] of its nominal value.
    pub jitter: bool,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// A policy that attempts exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_factor: 2.0,
            jitter: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Wall-clock limit for a single attempt in milliseconds.
    pub attempt_ms: u64,
}

impl TimeoutConfig {
    pub fn attempt(&self) -> Duration {
        Duration::from_millis(self.attempt_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { attempt_ms: 30_000 }
    }
}

/// Overrides for a single named operation.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct OperationConfig {
    pub breaker: Option<BreakerConfig>,
    pub retry: Option<RetryConfig>,
    pub timeout_ms: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
