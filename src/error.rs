//! Error types
//!
//! One enum per concern. Startup errors (`ConfigError`) are fatal; process
//! and rotation errors are absorbed by the controller; command errors go
//! straight back to whoever issued the command.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or is missing a required key.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is present but not acceptable.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A configured executable does not exist.
    #[error("{name} executable not found: {path}")]
    ExecutableNotFound { name: &'static str, path: PathBuf },
}

/// A supervised process could not be launched.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch {name}: {source}")]
    LaunchFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single identity rotation attempt failed.
///
/// Each variant carries the underlying cause as text so it can be shown in
/// status output without keeping the original error alive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotationError {
    #[error("control port unreachable: {0}")]
    ControlUnreachable(String),

    #[error("control port authentication failed: {0}")]
    AuthFailed(String),

    #[error("NEWNYM signal failed: {0}")]
    SignalFailed(String),

    #[error("IP probe failed: {0}")]
    ProbeFailed(String),
}

/// A front-end command was rejected without changing any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("interval must be between {min} and {max} seconds, got {value}")]
    InvalidInterval { value: u64, min: u64, max: u64 },

    #[error("rotation is disabled")]
    RotationDisabled,
}
