//! Session configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::error::ValidationError;

/// Where to negotiate from. Only the probe binary needs this; embedding
/// applications receive the seed capability from their login flow.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Seed capability URI. A bearer credential; never logged.
    pub seed_uri: Option<SecretString>,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(seed_uri) = &self.seed_uri {
            validate_seed_uri(seed_uri.expose_secret())?;
        }
        Ok(())
    }
}

/// Accepts absolute http(s) URLs only.
pub fn validate_seed_uri(raw: &str) -> Result<(), ValidationError> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::InvalidSeedUri),
    }
}
