//! External process supervision
//!
//! Start, poll and stop the Tor and gateway daemons.

pub mod supervisor;

pub use supervisor::SupervisedProcess;
