use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::constants::DEFAULT_REQUEST_TIMEOUT_MS;
use crate::Error;
use crate::Result;

/// Settings for the configurator microservice and its clients
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConfiguratorSettings {
    /// Path to the YAML property source file. No path means the configurator
    /// starts with an empty repository and relies on peer sync.
    #[serde(default)]
    pub source_path: Option<PathBuf>,

    /// Period of the background reload/anti-entropy task (seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// How long clients wait on a configurator reply (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ConfiguratorSettings {
    fn default() -> Self {
        Self {
            source_path: None,
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ConfiguratorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config(
                ConfigError::Message("refresh_interval_secs must be greater than 0".into()).into(),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(Error::Config(
                ConfigError::Message("request_timeout_ms must be greater than 0".into()).into(),
            ));
        }

        Ok(())
    }
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
