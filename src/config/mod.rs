//! Framework settings.
//!
//! Settings are merged from multiple sources with priority:
//! 1. Built-in defaults (hardcoded)
//! 2. Optional TOML settings file
//! 3. Environment variables (highest priority), prefixed `FLEETBUS__`,
//!    nested fields separated by `__`
//!    (e.g. `FLEETBUS__CONFIGURATOR__REFRESH_INTERVAL_SECS=60`).
//!
//! These settings configure the framework itself. Per-service properties are
//! a different thing entirely; they live in the replicated [`Repository`] and
//! are served by the configurator over the bus.
//!
//! [`Repository`]: crate::Repository

mod configurator;
pub use configurator::*;


use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_SHUTDOWN_TIMEOUT_MS;
use crate::constants::DEFAULT_STARTUP_TIMEOUT_MS;
use crate::Deployment;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Isolation plane this process belongs to. Leave empty to have the
    /// application generate a random one at construction.
    #[serde(default)]
    pub plane: String,

    /// Runtime environment class, `LOCAL` when unset.
    #[serde(default)]
    pub deployment: Deployment,

    /// Budget shared by all groups of one application startup (milliseconds)
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    /// Budget shared by all groups of one application shutdown (milliseconds)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Configurator microservice settings
    #[serde(default)]
    pub configurator: ConfiguratorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plane: String::new(),
            deployment: Deployment::default(),
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            configurator: ConfiguratorSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings with the documented source priority.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a TOML settings file; when given,
    ///   the file must exist
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("FLEETBUS")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates all settings sections
    pub fn validate(&self) -> Result<()> {
        if self.startup_timeout_ms == 0 {
            return Err(Error::Config(
                ConfigError::Message("startup_timeout_ms must be greater than 0".into()).into(),
            ));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(Error::Config(
                ConfigError::Message("shutdown_timeout_ms must be greater than 0".into()).into(),
            ));
        }

        self.configurator.validate()?;

        Ok(())
    }
}

fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_MS
}
fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}
