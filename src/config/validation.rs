//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, factor > 1, timeouts > 0)
//! - Check defaults and every per-operation override
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BreakerConfig, ResilienceConfig, RetryConfig};

/// A single semantic violation, tagged with where it was found.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_threshold must be at least 1")]
    ZeroFailureThreshold { scope: String },

    #[error("{scope}: recovery_timeout_ms must be greater than 0")]
    ZeroRecoveryTimeout { scope: String },

    #[error("{scope}: max_attempts must be at least 1")]
    ZeroAttempts { scope: String },

    #[error("{scope}: exponential_factor must be greater than 1 (got {factor})")]
    FactorTooSmall { scope: String, factor: f64 },

    #[error("{scope}: base_delay_ms ({base_ms}) exceeds max_delay_ms ({max_ms})")]
    BaseExceedsMax { scope: String, base_ms: u64, max_ms: u64 },

    #[error("{scope}: timeout must be greater than 0")]
    ZeroTimeout { scope: String },

    #[error("logging: unknown level `{0}`")]
    UnknownLogLevel(String),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_breaker("breaker", &config.breaker, &mut errors);
    check_retry("retry", &config.retry, &mut errors);
    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { scope: "timeouts".into() });
    }

    let mut names: Vec<&String> = config.operations.keys().collect();
    names.sort();
    for name in names {
        let op = &config.operations[name];
        let scope = format!("operations.{}", name);
        if let Some(breaker) = &op.breaker {
            check_breaker(&scope, breaker, &mut errors);
        }
        if let Some(retry) = &op.retry {
            check_retry(&scope, retry, &mut errors);
        }
        if op.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroTimeout { scope });
        }
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error" | "off") {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_breaker(scope: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold { scope: scope.into() });
    }
    if breaker.recovery_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRecoveryTimeout { scope: scope.into() });
    }
}

fn check_retry(scope: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts { scope: scope.into() });
    }
    // NaN fails this comparison too
    if !(retry.exponential_factor > 1.0) {
        errors.push(ValidationError::FactorTooSmall {
            scope: scope.into(),
            factor: retry.exponential_factor,
        });
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::BaseExceedsMax {
            scope: scope.into(),
            base_ms: retry.base_delay_ms,
            max_ms: retry.max_delay_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::OperationConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ResilienceConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = ResilienceConfig::default();
        config.breaker.failure_threshold = 0;
        config.retry.exponential_factor = 1.0;
        config.retry.base_delay_ms = 120_000;
        config.logging.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroFailureThreshold { scope: "breaker".into() }));
        assert!(errors.contains(&ValidationError::UnknownLogLevel("loud".into())));
    }

    #[test]
    fn test_checks_operation_overrides() {
        let mut config = ResilienceConfig::default();
        config.operations.insert(
            "export".into(),
            OperationConfig {
                retry: Some(RetryConfig {
                    max_attempts: 0,
                    ..RetryConfig::default()
                }),
                timeout_ms: Some(0),
                ..OperationConfig::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroAttempts { scope: "operations.export".into() },
                ValidationError::ZeroTimeout { scope: "operations.export".into() },
            ]
        );
        assert_eq!(errors[0].to_string(), "operations.export: max_attempts must be at least 1");
    }
}
