//! Configuration file loading

use super::Config;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file locations
const CONFIG_PATHS: &[&str] = &["./config.toml", "/etc/tor-rotator/config.toml"];

/// Find first existing config file
pub fn find_config_file() -> Result<PathBuf, ConfigError> {
    for path in CONFIG_PATHS {
        if Path::new(path).exists() {
            return Ok(PathBuf::from(path));
        }
    }
    Err(ConfigError::Invalid(format!(
        "no configuration file found, tried {:?}",
        CONFIG_PATHS
    )))
}

/// Load, parse and validate config from path
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    debug!("Loading configuration from {}", path.display());

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    super::validate(&config)?;

    Ok(config)
}
