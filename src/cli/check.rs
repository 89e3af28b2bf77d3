//! `check` command: validate configuration

use super::CheckArgs;
use crate::config;
use crate::tor::TorController;
use crate::util::time::format_duration;
use anyhow::{Context, Result};
use std::path::Path;

/// Load and validate the config, print what would be run
pub async fn run_check(config_path: &Path, args: &CheckArgs) -> Result<()> {
    let config = config::load_from_path(config_path)?;
    let rotation = config.rotation_config();

    println!("Configuration OK: {}", config_path.display());
    println!(
        "  Tor:           {} {}",
        config.paths.tor_executable.display(),
        config.paths.tor_command_args().join(" ")
    );
    println!(
        "  Gateway:       {} {}",
        config.paths.gateway_executable.display(),
        config.paths.gateway_args.join(" ")
    );
    println!("  Control port:  {}", rotation.control_endpoint);
    println!("  Gateway port:  127.0.0.1:{}", rotation.gateway_proxy_port);
    println!("  System proxy:  {:?}", config.gateway.system_proxy);
    println!(
        "  Interval:      {}",
        format_duration(config.rotation.default_interval_secs)
    );
    println!("  Probe URL:     {}", rotation.probe_url);

    if args.control {
        let mut tor = TorController::connect(&rotation.control_endpoint, rotation.control_timeout)
            .await
            .context("Control port check failed")?;
        tor.authenticate(&rotation.control_secret)
            .await
            .context("Control port authentication failed")?;
        println!("  Control port authentication OK");
    }

    Ok(())
}
