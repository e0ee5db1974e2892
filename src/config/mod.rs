//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file with environment variable
//! overrides for sensitive values like the store token.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

mod logging;
mod quorum;
mod quote;
mod risk;
mod server;
mod store;

pub use logging::LoggingConfig;
pub use quorum::QuorumConfig;
pub use quote::QuoteConfig;
pub use risk::RiskConfig;
pub use server::ServerConfig;
pub use store::{StoreBackend, StoreConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub quote: QuoteConfig,
    pub risk: RiskConfig,
    pub quorum: QuorumConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a TOML file, apply env overrides, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let mut config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Sensitive values come from the environment when present.
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("RAMPLINE_STORE_TOKEN") {
            self.store.token = Some(token);
        }
        if let Ok(url) = std::env::var("RAMPLINE_STORE_URL") {
            self.store.url = Some(url);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.store.validate()?;
        self.quote.validate()?;
        self.risk.validate()?;
        self.quorum.validate()?;
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
