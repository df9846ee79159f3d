//! Capability channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{NegotiatorOptions, RetryPolicy};

/// Timeouts and pacing for the seed request and the event queue.
#[derive(Debug, Clone, Deserialize)]
pub struct CapsConfig {
    /// Seed request timeout in seconds
    #[serde(default = "default_seed_timeout")]
    pub seed_timeout_secs: u64,

    /// Long-poll request timeout in seconds; must outlast the server's hold
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// First seed retry delay in milliseconds (0 retries immediately)
    #[serde(default)]
    pub retry_initial_delay_ms: u64,

    /// Seed retry delay cap in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Pause after a failed poll before re-polling, in milliseconds
    #[serde(default = "default_poll_error_delay")]
    pub poll_error_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl CapsConfig {
    pub fn seed_timeout(&self) -> Duration {
        Duration::from_secs(self.seed_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            Duration::from_millis(self.retry_initial_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn negotiator_options(&self) -> NegotiatorOptions {
        NegotiatorOptions {
            retry: self.retry_policy(),
            poll_error_delay: Duration::from_millis(self.poll_error_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.seed_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("seed_timeout_secs"));
        }
        if self.poll_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("poll_timeout_secs"));
        }
        if self.poll_timeout_secs <= 5 {
            return Err(ValidationError::PollTimeoutTooShort);
        }
        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            return Err(ValidationError::InvalidRetryDelays);
        }
        Ok(())
    }
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            seed_timeout_secs: default_seed_timeout(),
            poll_timeout_secs: default_poll_timeout(),
            retry_initial_delay_ms: 0,
            retry_max_delay_ms: default_retry_max_delay(),
            poll_error_delay_ms: default_poll_error_delay(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_seed_timeout() -> u64 {
    60
}

fn default_poll_timeout() -> u64 {
    90
}

fn default_retry_max_delay() -> u64 {
    30_000
}

fn default_poll_error_delay() -> u64 {
    1_000
}

fn default_user_agent() -> String {
    format!("gridlink/{}", env!("CARGO_PKG_VERSION"))
}
