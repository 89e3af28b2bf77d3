//! Tor identity rotation

mod rotator;

pub use rotator::{probe_ip, rotate, IdentityRotator, Rotate, RotationResult};
