//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use crate::error::{CommandError, ConfigError};
use std::path::Path;

/// Shortest accepted rotation interval
pub const MIN_INTERVAL_SECS: u64 = 3;
/// Longest accepted rotation interval
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_paths(config)?;
    validate_ports(config)?;
    validate_rotation(config)?;
    validate_timing(config)?;
    Ok(())
}

/// Check a rotation interval against the accepted range
pub fn validate_interval(secs: u64) -> Result<(), CommandError> {
    if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(CommandError::InvalidInterval {
            value: secs,
            min: MIN_INTERVAL_SECS,
            max: MAX_INTERVAL_SECS,
        })
    }
}

fn validate_paths(config: &Config) -> Result<(), ConfigError> {
    if !Path::new(&config.paths.tor_executable).exists() {
        return Err(ConfigError::ExecutableNotFound {
            name: "Tor",
            path: config.paths.tor_executable.clone(),
        });
    }
    if !Path::new(&config.paths.gateway_executable).exists() {
        return Err(ConfigError::ExecutableNotFound {
            name: "Gateway",
            path: config.paths.gateway_executable.clone(),
        });
    }
    Ok(())
}

fn validate_ports(config: &Config) -> Result<(), ConfigError> {
    if config.control.port == 0 {
        return Err(ConfigError::Invalid("control.port cannot be 0".to_string()));
    }
    if config.gateway.proxy_port == 0 {
        return Err(ConfigError::Invalid(
            "gateway.proxy_port cannot be 0".to_string(),
        ));
    }
    if config.control.host.is_empty() {
        return Err(ConfigError::Invalid(
            "control.host cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_rotation(config: &Config) -> Result<(), ConfigError> {
    validate_interval(config.rotation.default_interval_secs).map_err(|e| {
        ConfigError::Invalid(format!("rotation.default_interval_secs: {}", e))
    })?;

    let url = &config.rotation.probe_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid(format!(
            "rotation.probe_url must be an http(s) URL, got {}",
            url
        )));
    }
    Ok(())
}

fn validate_timing(config: &Config) -> Result<(), ConfigError> {
    let timing = &config.timing;
    if timing.wait_slice_ms == 0 {
        return Err(ConfigError::Invalid(
            "timing.wait_slice_ms must be greater than 0".to_string(),
        ));
    }
    if timing.probe_timeout_secs == 0 || timing.control_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "timing timeouts must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
