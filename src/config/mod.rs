//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! Configuration is immutable after load; the rotation interval is copied
//! into controller state and only mutated there.

pub mod file;
mod validation;

pub use file::{find_config_file, load_from_path};
pub use validation::{validate, validate_interval, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub control: ControlConfig,
    pub gateway: GatewayConfig,
    pub rotation: RotationSettings,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// Executables and their launch arguments
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Tor binary
    pub tor_executable: PathBuf,
    /// torrc passed with `-f`
    pub tor_rc_file: Option<PathBuf>,
    /// Extra arguments appended after the torrc
    #[serde(default)]
    pub tor_args: Vec<String>,
    /// Forwarding daemon binary (Clash or similar)
    pub gateway_executable: PathBuf,
    #[serde(default)]
    pub gateway_args: Vec<String>,
}

impl PathsConfig {
    /// Full argument list for the Tor process
    pub fn tor_command_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(rc) = &self.tor_rc_file {
            args.push("-f".to_string());
            args.push(rc.to_string_lossy().into_owned());
        }
        args.extend(self.tor_args.iter().cloned());
        args
    }
}

/// Tor control port connection
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_control_host")]
    pub host: String,
    pub port: u16,
    /// Plain password matching Tor's HashedControlPassword.
    /// Empty means cookie or null authentication.
    pub password: String,
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}

/// Where the system proxy should come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SystemProxyMode {
    /// Pick the backend for the current platform
    #[default]
    Auto,
    /// HKCU Internet Settings
    Windows,
    /// org.gnome.system.proxy via gsettings
    Gnome,
    /// Never touch the system proxy
    Off,
}

/// Local forwarding proxy
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// HTTP proxy port the gateway listens on
    pub proxy_port: u16,
    #[serde(default)]
    pub system_proxy: SystemProxyMode,
}

/// Rotation behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct RotationSettings {
    /// Initial rotation interval
    pub default_interval_secs: u64,
    /// Plain-text IP echo service
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
}

fn default_probe_url() -> String {
    "https://api.ipify.org".to_string()
}

/// Delays and timeouts. All optional.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Wait before the first rotation so the daemons can boot
    #[serde(default = "default_warmup")]
    pub warmup_secs: u64,
    /// Wait between NEWNYM and the IP probe
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Timeout for connecting to and talking with the control port
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,
    /// Granularity of the interruptible interval wait
    #[serde(default = "default_wait_slice")]
    pub wait_slice_ms: u64,
    /// Graceful stop window before a daemon is killed
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,
}

fn default_warmup() -> u64 {
    5
}
fn default_settle() -> u64 {
    2
}
fn default_probe_timeout() -> u64 {
    15
}
fn default_control_timeout() -> u64 {
    10
}
fn default_wait_slice() -> u64 {
    1000
}
fn default_stop_grace() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warmup_secs: default_warmup(),
            settle_secs: default_settle(),
            probe_timeout_secs: default_probe_timeout(),
            control_timeout_secs: default_control_timeout(),
            wait_slice_ms: default_wait_slice(),
            stop_grace_secs: default_stop_grace(),
        }
    }
}

/// Host and port of the Tor control port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEndpoint {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything one rotation attempt needs
#[derive(Debug, Clone)]
pub struct RotationConfig {
    pub control_endpoint: ControlEndpoint,
    pub control_secret: String,
    pub gateway_proxy_port: u16,
    pub probe_url: String,
    pub control_timeout: Duration,
    pub settle_delay: Duration,
    pub probe_timeout: Duration,
}

/// Controller loop timings
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub warmup: Duration,
    pub wait_slice: Duration,
    pub stop_grace: Duration,
}

impl Config {
    /// Settings passed to the identity rotator
    pub fn rotation_config(&self) -> RotationConfig {
        RotationConfig {
            control_endpoint: ControlEndpoint {
                host: self.control.host.clone(),
                port: self.control.port,
            },
            control_secret: self.control.password.clone(),
            gateway_proxy_port: self.gateway.proxy_port,
            probe_url: self.rotation.probe_url.clone(),
            control_timeout: Duration::from_secs(self.timing.control_timeout_secs),
            settle_delay: Duration::from_secs(self.timing.settle_secs),
            probe_timeout: Duration::from_secs(self.timing.probe_timeout_secs),
        }
    }

    pub fn timings(&self) -> Timings {
        Timings {
            warmup: Duration::from_secs(self.timing.warmup_secs),
            wait_slice: Duration::from_millis(self.timing.wait_slice_ms),
            stop_grace: Duration::from_secs(self.timing.stop_grace_secs),
        }
    }
}
