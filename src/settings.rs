//! Layered configuration loading.
//!
//! Built-in defaults, then a TOML file, then `FLUXRESCUE_*` environment
//! variables (e.g. `FLUXRESCUE_MULTIREAD_ATTEMPTS=9`). The result is a plain
//! [`RecoveryConfig`] value handed to the engine; nothing is kept globally.

use crate::RecoveryConfig;
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_PREFIX: &str = "FLUXRESCUE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// `config.toml` in the platform configuration directory, if one exists
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "fluxrescue", "fluxrescue").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load the session configuration.
///
/// An explicit `path` must exist. Without one, the platform default file is
/// used when present and silently skipped otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RecoveryConfig, ConfigError> {
    let (file, required) = match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            (Some(path.to_path_buf()), true)
        }
        None => (default_config_path(), false),
    };

    let mut builder = Config::builder().add_source(Config::try_from(&RecoveryConfig::default())?);

    if let Some(file) = &file {
        tracing::debug!(path = %file.display(), required, "Loading configuration file");
        builder = builder.add_source(File::from(file.as_path()).format(FileFormat::Toml).required(required));
    }

    let config: RecoveryConfig = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()?;

    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}
