//! Logging setup
//!
//! Logs go to stderr so stdout stays free for console replies and the
//! `rotate` command's IP output.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "tor_rotator=info";

/// Install the global subscriber.
///
/// `verbose` forces crate logs to debug. Otherwise `RUST_LOG` is used when
/// set, falling back to info.
pub fn init(verbose: bool) {
    fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(crate_directive(Level::DEBUG));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn crate_directive(level: Level) -> String {
    format!("tor_rotator={}", level)
}
