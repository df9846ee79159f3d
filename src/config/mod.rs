//! Client configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `GRIDLINK` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use gridlink::config::ClientConfig;
//!
//! let config = ClientConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! config.logging.init_tracing().expect("Failed to install tracing");
//! ```

mod caps;
mod dispatch;
mod error;
mod logging;
mod session;

pub use caps::CapsConfig;
pub use dispatch::DispatchConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use session::{validate_seed_uri, SessionConfig};

use serde::Deserialize;
use std::path::Path;

/// Root client configuration
///
/// Every section has defaults, so an empty environment yields a usable
/// configuration apart from the probe binary's seed URI.
#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    /// Seed request and event queue settings
    #[serde(default)]
    pub caps: CapsConfig,

    /// Handler execution settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Tracing subscriber settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Seed capability for the probe binary
    #[serde(default)]
    pub session: SessionConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `GRIDLINK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `GRIDLINK__CAPS__POLL_TIMEOUT_SECS=120` -> `caps.poll_timeout_secs = 120`
    /// - `GRIDLINK__SESSION__SEED_URI=...` -> `session.seed_uri = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a file, with environment variables layered on
    /// top. The format follows the file extension (TOML, JSON, YAML).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.caps.validate()?;
        self.dispatch.validate()?;
        self.logging.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("GRIDLINK")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("GRIDLINK__CAPS__POLL_TIMEOUT_SECS");
        env::remove_var("GRIDLINK__DISPATCH__WORKER_THREADS");
        env::remove_var("GRIDLINK__DISPATCH__FORCE_SYNC_PACKETS");
        env::remove_var("GRIDLINK__SESSION__SEED_URI");
    }

    #[test]
    fn test_load_defaults_from_empty_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = ClientConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.caps.poll_timeout_secs, 90);
        assert_eq!(config.dispatch.worker_threads, 4);
        assert!(config.session.seed_uri.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("GRIDLINK__CAPS__POLL_TIMEOUT_SECS", "120");
        env::set_var("GRIDLINK__DISPATCH__WORKER_THREADS", "8");
        env::set_var("GRIDLINK__DISPATCH__FORCE_SYNC_PACKETS", "true");
        env::set_var("GRIDLINK__SESSION__SEED_URI", "https://sim.example.com/cap/seed");
        let result = ClientConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.caps.poll_timeout_secs, 120);
        assert_eq!(config.dispatch.worker_threads, 8);
        assert!(config.dispatch.force_sync_packets);
        assert_eq!(
            config.session.seed_uri.as_ref().map(|s| s.expose_secret().as_str()),
            Some("https://sim.example.com/cap/seed")
        );
    }

    #[test]
    fn test_load_from_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[caps]\nseed_timeout_secs = 15\nretry_initial_delay_ms = 100\n\n[logging]\njson = true"
        )
        .unwrap();

        let config = ClientConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.caps.seed_timeout_secs, 15);
        assert_eq!(config.caps.retry_initial_delay_ms, 100);
        assert_eq!(config.caps.poll_timeout_secs, 90);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = ClientConfig::load_from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_seed_uri() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("GRIDLINK__SESSION__SEED_URI", "not a url");
        let result = ClientConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidSeedUri));
    }
}
