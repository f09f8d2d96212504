//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Instance identity configuration.
    pub instance: InstanceConfig,
    /// Processor (dispatch engine) configuration.
    #[serde(default)]
    pub processor: ProcessorConfig,
    /// Remote delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// Instance identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Instance name.
    pub name: String,
    /// Public base URL of this instance.
    pub base_url: url::Url,
}

/// Processor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Capacity of each inbound queue (client API and federator).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum number of concurrently running side-effect handlers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum consecutive activities taken from one queue while the
    /// other queue is non-empty.
    #[serde(default = "default_fairness_bound")]
    pub fairness_bound: u32,
    /// Deadline for a single handler invocation, in seconds.
    #[serde(default = "default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    /// Deadline for draining both queues on shutdown, in seconds.
    #[serde(default = "default_drain_deadline_secs")]
    pub drain_deadline_secs: u64,
}

impl ProcessorConfig {
    /// Deadline for a single handler invocation.
    #[must_use]
    pub const fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    /// Deadline for draining both queues on shutdown.
    #[must_use]
    pub const fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_secs)
    }

    /// Validate the configuration before the engine starts.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.queue_capacity == 0 {
            return Err(config::ConfigError::Message(
                "processor.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(config::ConfigError::Message(
                "processor.workers must be at least 1".to_string(),
            ));
        }
        if self.fairness_bound == 0 {
            return Err(config::ConfigError::Message(
                "processor.fairness_bound must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            fairness_bound: default_fairness_bound(),
            handler_timeout_secs: default_handler_timeout_secs(),
            drain_deadline_secs: default_drain_deadline_secs(),
        }
    }
}

/// Remote delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Capacity of the internal delivery job channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Maximum delivery attempts per job before abandonment.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay in seconds (doubled per attempt).
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Retry delay ceiling in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Deadline for a single delivery attempt, in seconds.
    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,
    /// Grace window on shutdown for retries already due, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl DeliveryConfig {
    /// Deadline for a single delivery attempt.
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    /// Grace window on shutdown for retries already due.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            delivery_timeout_secs: default_delivery_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

const fn default_queue_capacity() -> usize {
    100
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get() * 2)
}

const fn default_fairness_bound() -> u32 {
    8
}

const fn default_handler_timeout_secs() -> u64 {
    30
}

const fn default_drain_deadline_secs() -> u64 {
    30
}

const fn default_channel_capacity() -> usize {
    256
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_base_delay_secs() -> u64 {
    30
}

const fn default_max_delay_secs() -> u64 {
    3600
}

const fn default_delivery_timeout_secs() -> u64 {
    30
}

const fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CORVID_ENV`)
    /// 3. Environment variables with `CORVID_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CORVID_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CORVID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.processor.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CORVID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: Self = config.try_deserialize()?;
        parsed.processor.validate()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processor_defaults() {
        let config = ProcessorConfig::default();

        assert_eq!(config.queue_capacity, 100);
        assert!(config.workers >= 2);
        assert_eq!(config.fairness_bound, 8);
        assert_eq!(config.drain_deadline(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_processor_validation() {
        let config = ProcessorConfig {
            queue_capacity: 0,
            ..ProcessorConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delivery_defaults() {
        let config = DeliveryConfig::default();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_secs, 30);
        assert_eq!(config.max_delay_secs, 3600);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }
}
