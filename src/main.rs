//! tor-rotator - keep a fresh Tor identity behind a local proxy gateway
//!
//! Starts Tor and a forwarding proxy (Clash or similar), points the system
//! proxy at the gateway, and periodically sends NEWNYM, confirming the new
//! exit IP through the gateway.
//!
//! # Usage
//!
//! ```bash
//! # Validate configuration and test the control port
//! tor-rotator --config config.toml check --control
//!
//! # Run interactively (status / toggle / interval N / rotate / quit)
//! tor-rotator --config config.toml run
//!
//! # Run as a service
//! tor-rotator --config /etc/tor-rotator/config.toml run --headless
//!
//! # Rotate once against already running daemons
//! tor-rotator rotate
//! ```

use anyhow::Result;
use clap::Parser;
use tor_rotator::cli::{self, Cli, Commands};
use tor_rotator::{config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    // Determine config path
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::find_config_file()?,
    };

    match &cli.command {
        Commands::Run(args) => {
            cli::run_daemon(&config_path, args).await?;
        },
        Commands::Check(args) => {
            cli::run_check(&config_path, args).await?;
        },
        Commands::Rotate => {
            cli::run_rotate(&config_path).await?;
        },
    }

    Ok(())
}
