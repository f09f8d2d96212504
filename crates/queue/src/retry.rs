//! Retry policy and abandoned-delivery records.

#![allow(missing_docs)]

use std::time::Duration;

use corvid_common::DeliveryConfig;

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempt passes per job.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600), // 1 hour
            multiplier: 2.0,
        }
    }
}

impl From<&DeliveryConfig> for RetryConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay before the given retry (0-indexed: the first retry
    /// uses `initial_delay`).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_attempts {
            return self.max_delay;
        }

        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(delay_secs);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Check whether another pass is allowed after `attempts` passes.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Record of one recipient the scheduler gave up on.
#[derive(Debug, Clone)]
pub struct AbandonedDelivery {
    /// The account ID the payload was sent on behalf of.
    pub actor_id: String,
    /// The inbox that never accepted the payload.
    pub inbox: url::Url,
    /// Number of attempt passes made before giving up.
    pub attempts: u32,
    /// Why the recipient was abandoned.
    pub reason: String,
    /// Timestamp of the abandonment.
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

impl AbandonedDelivery {
    /// Record an abandonment at the current time.
    pub fn new(actor_id: String, inbox: url::Url, attempts: u32, reason: String) -> Self {
        Self {
            actor_id,
            inbox,
            attempts,
            reason,
            failed_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig::default();

        // First retry: 30s
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(30));
        // Second retry: 60s
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(60));
        // Third retry: 120s
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(120));
        // Fourth retry: 240s
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(240));
    }

    #[test]
    fn test_max_delay() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1800),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
        };

        // Should be capped at max_delay
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(3600));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
        assert!(!config.should_retry(4));
    }

    #[test]
    fn test_from_delivery_config() {
        let delivery = DeliveryConfig::default();
        let config = RetryConfig::from(&delivery);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(30));
        assert_eq!(config.max_delay, Duration::from_secs(3600));
    }
}
