//! Command-line interface for tor-rotator
//!
//! Provides main commands:
//! - `run` - Start Tor and the gateway and rotate on a timer
//! - `check` - Validate the configuration (optionally test the control port)
//! - `rotate` - Rotate once against already running daemons

mod check;
mod console;
mod rotate;
mod run;

pub use check::run_check;
pub use console::{parse_command, ConsoleCommand};
pub use rotate::run_rotate;
pub use run::run_daemon;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tor-rotator - Tor identity rotation behind a local proxy gateway
#[derive(Parser, Debug)]
#[command(name = "tor-rotator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (default: ./config.toml, then /etc/tor-rotator/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemons and the rotation loop
    Run(RunArgs),

    /// Validate configuration
    Check(CheckArgs),

    /// Rotate the identity once and print the new IP
    Rotate,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Don't read commands from stdin; run until Ctrl-C or SIGTERM
    #[arg(long, default_value_t = false)]
    pub headless: bool,
}

/// Arguments for check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Also connect and authenticate to the control port
    #[arg(long, default_value_t = false)]
    pub control: bool,
}
