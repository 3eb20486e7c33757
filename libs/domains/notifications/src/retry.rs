//! Retry policy for transient provider failures.

use crate::error::ProviderError;
use core_config::{env_duration_ms, env_parse, ConfigError, FromEnv};
use std::time::Duration;

/// Exponential backoff bounded by `max_attempts` total attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Whether another attempt follows `attempts_made` failed ones.
    pub fn should_retry(&self, attempts_made: u32, error: &ProviderError) -> bool {
        error.is_transient() && attempts_made < self.max_attempts
    }

    /// Sleep before the attempt after `attempts_made`: `base * 2^(attempts_made - 1)`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempts_made: u32) -> Duration {
        let exponent = attempts_made.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl FromEnv for RetryPolicy {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_attempts: u32 = env_parse("EMAIL_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMAIL_MAX_ATTEMPTS".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self::new(
            max_attempts,
            env_duration_ms("EMAIL_RETRY_BASE_DELAY_MS", defaults.base_delay)?,
            env_duration_ms("EMAIL_RETRY_MAX_DELAY_MS", defaults.max_delay)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100), Duration::from_millis(1000));

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_only_transient_errors_are_retried() {
        let policy = RetryPolicy::default();
        let transient = ProviderError::transient("smtp", "timeout");
        let rejected = ProviderError::rejected("smtp", "mailbox unavailable");

        assert!(policy.should_retry(1, &transient));
        assert!(policy.should_retry(2, &transient));
        assert!(!policy.should_retry(3, &transient));
        assert!(!policy.should_retry(1, &rejected));
    }

    #[test]
    fn test_zero_attempts_still_sends_once() {
        let transient = ProviderError::transient("smtp", "timeout");
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1, &transient));
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("EMAIL_MAX_ATTEMPTS", Some("5")),
                ("EMAIL_RETRY_BASE_DELAY_MS", Some("10")),
                ("EMAIL_RETRY_MAX_DELAY_MS", None),
            ],
            || {
                let policy = RetryPolicy::from_env().unwrap();
                assert_eq!(policy.max_attempts, 5);
                assert_eq!(policy.base_delay, Duration::from_millis(10));
                assert_eq!(policy.max_delay, Duration::from_secs(30));
            },
        );

        temp_env::with_var("EMAIL_MAX_ATTEMPTS", Some("0"), || {
            assert!(RetryPolicy::from_env().is_err());
        });
    }
}
