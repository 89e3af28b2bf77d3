//! Runtime state management

mod model;

pub use model::{ControllerState, IpStatus};
