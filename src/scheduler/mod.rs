//! Task scheduling and main loop
//!
//! The periodic rotation loop. Rotation tasks themselves are spawned by
//! the controller.

mod loops;

pub use loops::rotation_loop;
