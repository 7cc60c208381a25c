//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule derived from a [`RetryConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    factor: f64,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, factor: f64, jitter: bool) -> Self {
        Self { base, max, factor, jitter }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.base_delay(),
            config.max_delay(),
            config.exponential_factor,
            config.jitter,
        )
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based).
    ///
    /// `min(base * factor^(attempt-1), max)`
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.base.as_secs_f64() * self.factor.powi(exponent);
        let max = self.max.as_secs_f64();

        // powi overflows to infinity long before the cap matters
        if scaled.is_nan() || scaled >= max {
            self.max
        } else {
            // a negative factor flips the sign on odd exponents
            Duration::from_secs_f64(scaled.max(0.0))
        }
    }

    /// Delay to sleep after failed attempt `attempt`, with jitter applied when enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }

        let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        nominal.mul_f64(factor)
    }

    /// Upper bound on the total suspension of a run with `max_attempts` attempts.
    pub fn max_total_delay(&self, max_attempts: u32) -> Duration {
        (1..max_attempts).map(|attempt| self.nominal_delay(attempt)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0, false);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));

        let capped = backoff.delay(10);
        assert_eq!(capped, Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_huge_attempt_saturates_at_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5), 10.0, false);
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_negative_factor_never_goes_below_zero() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), -2.0, false);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::ZERO);
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let backoff = Backoff::new(Duration::from_secs(4), Duration::from_secs(60), 2.0, true);
        for _ in 0..200 {
            let d = backoff.delay(2);
            assert!(d >= Duration::from_secs(4), "got {:?}", d);
            assert!(d <= Duration::from_secs(8), "got {:?}", d);
        }
    }

    #[test]
    fn test_max_total_delay() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0, true);
        assert_eq!(backoff.max_total_delay(4), Duration::from_secs(7));
        assert_eq!(backoff.max_total_delay(1), Duration::ZERO);
    }
}
