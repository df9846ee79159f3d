//! Dispatch configuration

use serde::Deserialize;

use super::error::ValidationError;

/// How packet handlers are executed.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Run every packet chain inline, ignoring async registrations
    #[serde(default)]
    pub force_sync_packets: bool,

    /// Maximum number of handler tasks running at once on the worker pool
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_threads == 0 {
            return Err(ValidationError::InvalidWorkerThreads);
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            force_sync_packets: false,
            worker_threads: default_worker_threads(),
        }
    }
}

fn default_worker_threads() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_defaults() {
        let config = DispatchConfig::default();
        assert!(!config.force_sync_packets);
        assert_eq!(config.worker_threads, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_workers() {
        let config = DispatchConfig {
            worker_threads: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWorkerThreads));
    }
}
