//! tor-rotator library crate
//!
//! Supervises Tor and a local proxy gateway, rotates the Tor identity on a
//! timer and keeps the system proxy pointed at the gateway.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface (run, check, rotate)
//! - [`config`] - Configuration loading and validation
//! - [`controller`] - Rotation controller: daemons, enable state, interval
//! - [`error`] - Error types
//! - [`process`] - Supervised external processes
//! - [`proxy`] - Gateway manager and system proxy backends
//! - [`rotation`] - One identity rotation (NEWNYM + IP probe)
//! - [`scheduler`] - Periodic rotation loop
//! - [`state`] - Controller state model
//! - [`tor`] - Tor control port client
//! - [`util`] - Helpers

#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::cast_possible_wrap)] // pid_t conversion is controlled
#![allow(clippy::significant_drop_tightening)] // Lock scope is intentional
#![allow(clippy::single_match_else)] // Match for clarity
#![allow(clippy::module_name_repetitions)] // Type names read better in full
#![allow(clippy::missing_errors_doc)] // Error enums document themselves

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod process;
pub mod proxy;
pub mod rotation;
pub mod scheduler;
pub mod state;
pub mod tor;
pub mod util;

pub use controller::{DaemonStatus, Daemons, RotationController};
pub use error::{CommandError, ConfigError, ProcessError, RotationError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
