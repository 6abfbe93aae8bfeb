//! # Scheduler Configuration
//!
//! Environment-backed configuration with explicit defaults and validation.
//! Sibling services configure themselves from environment variables, so this
//! crate reads a `SCHEDULER_`-prefixed environment source instead of
//! configuration files. No silent fallbacks at use sites: everything is
//! resolved and validated once, up front.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ingest_scheduler::config::SchedulerConfig;
//!
//! # fn main() -> Result<(), ingest_scheduler::config::ConfigurationError> {
//! // SCHEDULER_CONNECTION_RETRIES=10 SCHEDULER_CORRELATION_BACKOFF_MS=500 ...
//! let config = SchedulerConfig::from_env()?;
//! let backoff = config.connection_backoff();
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read configuration from environment: {0}")]
    Source(#[from] config::ConfigError),
}

/// Runtime configuration for the scheduler core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Attempts for bus connection and startup snapshot replay
    pub connection_retries: u32,
    /// Fixed backoff between connection/replay attempts in milliseconds
    pub connection_backoff_ms: u64,
    /// Attempts for one datasource trigger dispatch
    pub trigger_retries: u32,
    /// Fixed backoff between trigger dispatch attempts in milliseconds
    pub trigger_backoff_ms: u64,
    /// Poll attempts while waiting for an execution result
    pub correlation_attempts: u32,
    /// Fixed backoff between correlation polls in milliseconds
    pub correlation_backoff_ms: u64,
    /// Capacity of the trigger registry command channel
    pub command_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            connection_retries: 30,
            connection_backoff_ms: 3000,
            trigger_retries: 3,
            trigger_backoff_ms: 1000,
            correlation_attempts: 10,
            correlation_backoff_ms: 1000,
            command_channel_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from `SCHEDULER_`-prefixed environment variables.
    ///
    /// Unset variables fall back to defaults; set variables must parse and
    /// the resulting configuration must validate.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("SCHEDULER").try_parsing(true))
            .build()?;

        let loaded: SchedulerConfig = source.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations that would disable retry loops or stall polling
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.connection_retries == 0 {
            return Err(ConfigurationError::Invalid(
                "connection_retries must be at least 1".to_string(),
            ));
        }
        if self.trigger_retries == 0 {
            return Err(ConfigurationError::Invalid(
                "trigger_retries must be at least 1".to_string(),
            ));
        }
        if self.correlation_attempts == 0 {
            return Err(ConfigurationError::Invalid(
                "correlation_attempts must be at least 1".to_string(),
            ));
        }
        if self.correlation_backoff_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "correlation_backoff_ms must be at least 1".to_string(),
            ));
        }
        if self.command_channel_capacity == 0 {
            return Err(ConfigurationError::Invalid(
                "command_channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connection_backoff(&self) -> Duration {
        Duration::from_millis(self.connection_backoff_ms)
    }

    pub fn trigger_backoff(&self) -> Duration {
        Duration::from_millis(self.trigger_backoff_ms)
    }

    pub fn correlation_backoff(&self) -> Duration {
        Duration::from_millis(self.correlation_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.connection_retries, 30);
        assert_eq!(config.connection_backoff(), Duration::from_secs(3));
        assert_eq!(config.correlation_attempts, 10);
        assert_eq!(config.correlation_backoff(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let config = SchedulerConfig {
            connection_retries: 0,
            ..SchedulerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connection_retries"));
    }

    #[test]
    fn test_validation_rejects_zero_correlation_backoff() {
        let config = SchedulerConfig {
            correlation_backoff_ms: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_override() {
        std::env::set_var("SCHEDULER_TRIGGER_RETRIES", "7");
        let config = SchedulerConfig::from_env().expect("env config should load");
        assert_eq!(config.trigger_retries, 7);
        // untouched values keep defaults
        assert_eq!(config.correlation_attempts, 10);
        std::env::remove_var("SCHEDULER_TRIGGER_RETRIES");
    }
}
