//! Rotation controller
//!
//! Owns the two daemons, the enabled flag and the interval, and serializes
//! every rotation, toggle, interval change and shutdown.
//!
//! Two locks, always taken in this order:
//! - `daemons`: held across process start/stop so lifecycle transitions
//!   never interleave
//! - `state`: held only for bookkeeping, never across network I/O
//!
//! Every state change is mirrored into a `watch` channel so front-ends can
//! read a snapshot or subscribe without touching the lock.

use crate::config::{Config, RotationConfig, Timings};
use crate::error::CommandError;
use crate::process::SupervisedProcess;
use crate::proxy::{system, ProxyGateway};
use crate::rotation::{IdentityRotator, Rotate};
use crate::scheduler;
use crate::state::{ControllerState, IpStatus};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The two supervised daemons
pub struct Daemons {
    /// Anonymity daemon (Tor)
    pub tor: SupervisedProcess,
    /// Forwarding daemon plus system proxy
    pub gateway: ProxyGateway,
}

/// Liveness report for status output and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonStatus {
    pub tor_alive: bool,
    pub gateway_alive: bool,
    /// Port the system proxy points at, if enabled
    pub system_proxy_port: Option<u16>,
}

impl DaemonStatus {
    pub fn all_stopped(&self) -> bool {
        !self.tor_alive && !self.gateway_alive && self.system_proxy_port.is_none()
    }
}

/// What the periodic loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Enabled,
    Disabled,
    ShuttingDown,
}

/// Who asked for a rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Manual,
    Scheduled,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => f.write_str("manual"),
            Trigger::Scheduled => f.write_str("scheduled"),
        }
    }
}

pub struct RotationController {
    rotation: RotationConfig,
    timings: Timings,
    rotator: Arc<dyn Rotate>,
    state: Mutex<ControllerState>,
    status_tx: watch::Sender<ControllerState>,
    daemons: Mutex<Daemons>,
    /// Wakes the periodic loop early after a state change
    wake: Notify,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RotationController {
    pub fn new(
        rotation: RotationConfig,
        timings: Timings,
        interval_secs: u64,
        daemons: Daemons,
        rotator: Arc<dyn Rotate>,
    ) -> Arc<Self> {
        let state = ControllerState::new(interval_secs);
        let (status_tx, _) = watch::channel(state.clone());

        Arc::new(Self {
            rotation,
            timings,
            rotator,
            state: Mutex::new(state),
            status_tx,
            daemons: Mutex::new(daemons),
            wake: Notify::new(),
            loop_handle: Mutex::new(None),
        })
    }

    /// Controller wired to the real daemons, system proxy and rotator
    pub fn from_config(config: &Config) -> Arc<Self> {
        let tor = SupervisedProcess::new(
            config.paths.tor_executable.clone(),
            config.paths.tor_command_args(),
        );
        let gateway = ProxyGateway::new(
            SupervisedProcess::new(
                config.paths.gateway_executable.clone(),
                config.paths.gateway_args.clone(),
            ),
            system::from_mode(config.gateway.system_proxy),
        );

        Self::new(
            config.rotation_config(),
            config.timings(),
            config.rotation.default_interval_secs,
            Daemons { tor, gateway },
            Arc::new(IdentityRotator),
        )
    }

    /// Start both daemons, enable rotation and spawn the periodic loop
    pub async fn launch(self: &Arc<Self>) {
        let mut loop_handle = self.loop_handle.lock().await;
        if loop_handle.is_some() {
            warn!("Controller already launched");
            return;
        }
        if self.state.lock().await.shutting_down {
            warn!("Launch ignored after shutdown");
            return;
        }

        {
            let mut daemons = self.daemons.lock().await;
            let failure = self.start_daemons(&mut daemons).await;

            let mut state = self.state.lock().await;
            state.enabled = !state.shutting_down;
            if failure.is_some() {
                state.last_error = failure;
            }
            self.publish(&state);
        }

        info!(
            "Rotation controller started, interval {}s",
            self.snapshot().interval_secs
        );
        *loop_handle = Some(tokio::spawn(scheduler::rotation_loop(Arc::clone(self))));
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> ControllerState {
        self.status_tx.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.status_tx.subscribe()
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// Flip rotation on or off, starting or stopping both daemons.
    ///
    /// Returns the new enabled state. Ignored once shutdown has begun.
    pub async fn toggle_enabled(&self) -> bool {
        let mut daemons = self.daemons.lock().await;

        let (enabled, shutting_down) = {
            let state = self.state.lock().await;
            (state.enabled, state.shutting_down)
        };
        if shutting_down {
            debug!("Toggle ignored during shutdown");
            return false;
        }

        if enabled {
            {
                let mut state = self.state.lock().await;
                state.enabled = false;
                self.publish(&state);
            }
            self.wake.notify_one();
            self.stop_daemons(&mut daemons).await;
            info!("Rotation disabled");
            false
        } else {
            let failure = self.start_daemons(&mut daemons).await;
            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return false;
                }
                state.enabled = true;
                if failure.is_some() {
                    state.last_error = failure;
                }
                self.publish(&state);
            }
            self.wake.notify_one();
            info!("Rotation enabled");
            true
        }
    }

    /// Change the rotation interval; applies to the wait in progress
    pub async fn set_interval(&self, secs: u64) -> Result<(), CommandError> {
        crate::config::validate_interval(secs)?;
        {
            let mut state = self.state.lock().await;
            state.interval_secs = secs;
            self.publish(&state);
        }
        self.wake.notify_one();
        info!("Rotation interval set to {}s", secs);
        Ok(())
    }

    /// Rotate now on a background task.
    ///
    /// Returns `Ok(false)` when a rotation is already in flight and this
    /// request was dropped.
    pub async fn rotate_now(self: &Arc<Self>) -> Result<bool, CommandError> {
        if !self.admit(Trigger::Manual).await? {
            return Ok(false);
        }
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_admitted().await });
        Ok(true)
    }

    /// Stop rotating, let the loop exit, then stop both daemons
    pub async fn shutdown(&self) {
        {
            let mut state = self.state.lock().await;
            if state.shutting_down {
                debug!("Shutdown already in progress");
                return;
            }
            state.shutting_down = true;
            state.enabled = false;
            self.publish(&state);
        }
        self.wake.notify_one();
        info!("Shutting down");

        if let Some(mut handle) = self.loop_handle.lock().await.take() {
            let grace = self.timings.wait_slice + Duration::from_millis(100);
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("Rotation loop still busy after {:?}, aborting it", grace);
                handle.abort();
            }
        }

        let mut daemons = self.daemons.lock().await;
        self.stop_daemons(&mut daemons).await;
        info!("Shutdown complete");
    }

    pub async fn daemon_status(&self) -> DaemonStatus {
        let mut daemons = self.daemons.lock().await;
        DaemonStatus {
            tor_alive: daemons.tor.is_alive(),
            gateway_alive: daemons.gateway.is_up(),
            system_proxy_port: daemons.gateway.active_port(),
        }
    }

    pub(crate) async fn phase(&self) -> Phase {
        let state = self.state.lock().await;
        if state.shutting_down {
            Phase::ShuttingDown
        } else if state.enabled {
            Phase::Enabled
        } else {
            Phase::Disabled
        }
    }

    /// Scheduled rotation; waits for it to finish
    pub(crate) async fn rotate_scheduled(self: &Arc<Self>) {
        match self.admit(Trigger::Scheduled).await {
            Ok(true) => {},
            Ok(false) | Err(_) => return,
        }

        // Own task so aborting the loop never cancels a rotation half way
        let this = Arc::clone(self);
        if let Err(e) = tokio::spawn(async move { this.run_admitted().await }).await {
            error!("Rotation task failed: {}", e);
        }
    }

    /// Wait up to `period` while rotation stays enabled.
    ///
    /// `period` is re-read from state on every slice so interval changes
    /// apply to a wait already in progress. Returns false if the wait was
    /// cut short by a disable or shutdown.
    pub(crate) async fn wait_while_enabled<F>(&self, period: F) -> bool
    where
        F: Fn(&ControllerState) -> Duration,
    {
        let started = Instant::now();
        loop {
            let target = {
                let state = self.state.lock().await;
                if !state.enabled || state.shutting_down {
                    return false;
                }
                period(&state)
            };

            let elapsed = started.elapsed();
            if elapsed >= target {
                return true;
            }

            let slice = (target - elapsed).min(self.timings.wait_slice);
            let _ = tokio::time::timeout(slice, self.wake.notified()).await;
        }
    }

    /// Sleep one slice or until woken
    pub(crate) async fn idle(&self) {
        let _ = tokio::time::timeout(self.timings.wait_slice, self.wake.notified()).await;
    }

    /// Single-slot admission: claim the rotation slot if it is free
    async fn admit(&self, trigger: Trigger) -> Result<bool, CommandError> {
        let mut state = self.state.lock().await;
        if !state.enabled || state.shutting_down {
            return Err(CommandError::RotationDisabled);
        }
        if state.rotation_in_flight {
            debug!("{} rotation dropped, one is already in flight", trigger);
            return Ok(false);
        }

        state.rotation_in_flight = true;
        state.ip = IpStatus::Rotating;
        self.publish(&state);
        info!("Starting {} rotation", trigger);
        Ok(true)
    }

    /// Run a rotation that already holds the slot, then release it
    async fn run_admitted(&self) {
        let result = self.rotator.rotate(&self.rotation).await;

        let mut state = self.state.lock().await;
        state.rotation_in_flight = false;
        match result {
            Ok(ip) => state.record_success(ip),
            Err(e) => {
                warn!("Rotation failed: {}", e);
                state.record_failure(e.to_string());
            },
        }
        self.publish(&state);
    }

    /// Start Tor, then the gateway and system proxy.
    ///
    /// Both are attempted; the last failure is returned for status output.
    async fn start_daemons(&self, daemons: &mut Daemons) -> Option<String> {
        let mut failure = None;

        if let Err(e) = daemons.tor.start() {
            failure = Some(e.to_string());
        }
        if let Err(e) = daemons
            .gateway
            .bring_up(self.rotation.gateway_proxy_port, self.timings.stop_grace)
            .await
        {
            failure = Some(e.to_string());
        }

        failure
    }

    /// Disable the system proxy and stop both daemons
    async fn stop_daemons(&self, daemons: &mut Daemons) {
        daemons.gateway.bring_down(self.timings.stop_grace).await;
        daemons.tor.stop(self.timings.stop_grace).await;
    }

    fn publish(&self, state: &ControllerState) {
        self.status_tx.send_replace(state.clone());
    }
}
