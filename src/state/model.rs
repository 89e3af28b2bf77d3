//! Runtime state model

use std::fmt;
use std::time::SystemTime;

/// What the front-end shows as "current IP"
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IpStatus {
    /// Never probed
    #[default]
    Unknown,
    /// A rotation is in flight
    Rotating,
    /// Last rotation succeeded with this IP
    Known(String),
    /// Last rotation failed
    Error,
}

impl fmt::Display for IpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpStatus::Unknown => f.write_str("unknown"),
            IpStatus::Rotating => f.write_str("rotating"),
            IpStatus::Known(ip) => f.write_str(ip),
            IpStatus::Error => f.write_str("error"),
        }
    }
}

/// Controller state. Owned by the controller, cloned out as a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerState {
    /// Automatic rotation on and daemons supposed to be running
    pub enabled: bool,
    pub interval_secs: u64,
    pub ip: IpStatus,
    pub rotation_in_flight: bool,
    /// Set once shutdown begins; the loop exits when it sees it
    pub shutting_down: bool,
    /// Text of the most recent failure, cleared by a successful rotation
    pub last_error: Option<String>,
    pub rotations_succeeded: u64,
    pub rotations_failed: u64,
    pub last_rotation: Option<SystemTime>,
}

impl ControllerState {
    /// Create initial state
    pub fn new(interval_secs: u64) -> Self {
        Self {
            enabled: false,
            interval_secs,
            ip: IpStatus::Unknown,
            rotation_in_flight: false,
            shutting_down: false,
            last_error: None,
            rotations_succeeded: 0,
            rotations_failed: 0,
            last_rotation: None,
        }
    }

    /// Record the outcome of a finished rotation
    pub fn record_success(&mut self, ip: String) {
        self.ip = IpStatus::Known(ip);
        self.last_error = None;
        self.rotations_succeeded += 1;
        self.last_rotation = Some(SystemTime::now());
    }

    pub fn record_failure(&mut self, error: String) {
        self.ip = IpStatus::Error;
        self.last_error = Some(error);
        self.rotations_failed += 1;
        self.last_rotation = Some(SystemTime::now());
    }

    /// Seconds since the last finished rotation
    pub fn since_last_rotation(&self) -> Option<u64> {
        self.last_rotation
            .and_then(|t| t.elapsed().ok().map(|d| d.as_secs()))
    }
}
