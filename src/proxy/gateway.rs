//! Proxy gateway manager
//!
//! Couples the forwarding daemon's process with the system proxy so that
//! the proxy only ever points at the gateway we are tracking.

use super::system::SystemProxy;
use crate::error::ProcessError;
use crate::process::SupervisedProcess;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct ProxyGateway {
    process: SupervisedProcess,
    system_proxy: Box<dyn SystemProxy>,
    /// Port the system proxy currently points at
    active_port: Option<u16>,
}

impl ProxyGateway {
    pub fn new(process: SupervisedProcess, system_proxy: Box<dyn SystemProxy>) -> Self {
        Self {
            process,
            system_proxy,
            active_port: None,
        }
    }

    /// Start the gateway, then point the system proxy at it.
    ///
    /// The two steps are sequential. If enabling the system proxy fails the
    /// gateway is left running and the failure is only logged. A launch
    /// failure is returned and the system proxy is left untouched.
    pub async fn bring_up(&mut self, port: u16, grace: Duration) -> Result<(), ProcessError> {
        if let Some(current) = self.active_port {
            if current != port {
                info!("Gateway port changing {} -> {}", current, port);
                self.bring_down(grace).await;
            }
        }

        self.process.start()?;

        match self.system_proxy.enable(port).await {
            Ok(()) => self.active_port = Some(port),
            Err(e) => error!(
                "Gateway running but system proxy ({}) not enabled: {:#}",
                self.system_proxy.name(),
                e
            ),
        }
        Ok(())
    }

    /// Turn the system proxy off, then stop the gateway
    pub async fn bring_down(&mut self, grace: Duration) {
        if let Err(e) = self.system_proxy.disable().await {
            warn!(
                "Failed to disable system proxy ({}): {:#}",
                self.system_proxy.name(),
                e
            );
        }
        self.active_port = None;
        self.process.stop(grace).await;
    }

    pub fn is_up(&mut self) -> bool {
        self.process.is_alive()
    }

    pub fn active_port(&self) -> Option<u16> {
        self.active_port
    }

    pub fn process_mut(&mut self) -> &mut SupervisedProcess {
        &mut self.process
    }
}
