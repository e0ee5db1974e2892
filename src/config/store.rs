//! Keyed-store backend selection.

use serde::Deserialize;

use crate::error::ConfigError;

/// Which keyed-store implementation to construct at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process map; single-instance runs and tests.
    #[default]
    Memory,
    /// Replicated REST keyed store, wrapped in the memory fallback.
    Rest,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub token: Option<String>,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StoreBackend::Rest {
            if self.url.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField {
                    field: "store.url",
                });
            }
            if self.token.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::MissingField {
                    field: "store.token",
                });
            }
        }
        Ok(())
    }
}
