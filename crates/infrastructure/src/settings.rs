//! Layered settings: defaults, an optional TOML file, then `TALLY_*`
//! environment variables.
//!
//! Nested keys use `__` in the environment, e.g.
//! `TALLY_CLIENT__BASE_URL` or `TALLY_CLIENT__ENDPOINTS__RENEW`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tally_application::ClientConfig;
use thiserror::Error;

const ENV_PREFIX: &str = "TALLY";
const APP_DIR: &str = "tally";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or did not match the expected shape.
    #[error("invalid settings: {0}")]
    Config(#[from] config::ConfigError),

    /// No default location exists for the credential file on this platform.
    #[error("no config directory available, set storage_path explicitly")]
    NoStorageLocation,
}

/// Everything the binary needs to build a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Client behavior
    pub client: ClientConfig,
    /// Credential file; defaults to the platform config directory
    pub storage_path: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            storage_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` (required when given) or the default
    /// settings file (optional), overlaid with environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or deserialized.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        match path {
            Some(path) => builder = builder.add_source(File::from(path).required(true)),
            None => {
                if let Some(default) = default_settings_path() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }

        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Returns the credential file location.
    ///
    /// # Errors
    ///
    /// Returns `NoStorageLocation` when no path is configured and the
    /// platform has no config directory.
    pub fn credential_path(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.storage_path {
            return Ok(path.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("credentials.json"))
            .ok_or(SettingsError::NoStorageLocation)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("settings.toml"))
}
