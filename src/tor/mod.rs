//! Tor daemon interaction
//!
//! Handles Tor ControlPort communication. Tor itself is treated as a
//! black box started and stopped by the process supervisor.

pub mod control;

pub use control::TorController;
