//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Tracing initialisation failed: {0}")]
    TracingInit(String),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid timeout: {0} must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Poll timeout must be longer than 5 seconds")]
    PollTimeoutTooShort,

    #[error("Retry max delay is shorter than the initial delay")]
    InvalidRetryDelays,

    #[error("Worker thread count must be at least 1")]
    InvalidWorkerThreads,

    #[error("Seed URI is not a valid http(s) URL")]
    InvalidSeedUri,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
