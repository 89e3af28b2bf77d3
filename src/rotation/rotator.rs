//! Identity rotation
//!
//! One attempt = authenticate on the control port, NEWNYM, wait for the
//! new circuit, then ask an IP echo service what we look like through the
//! gateway. Any failing step ends the attempt; retries belong to the caller.

use crate::config::RotationConfig;
use crate::error::RotationError;
use crate::tor::TorController;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of one rotation: the external IP, or the step that failed
pub type RotationResult = Result<String, RotationError>;

/// Something that can perform a rotation attempt
#[async_trait]
pub trait Rotate: Send + Sync {
    async fn rotate(&self, config: &RotationConfig) -> RotationResult;
}

/// Rotates through the real Tor control port and gateway
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRotator;

#[async_trait]
impl Rotate for IdentityRotator {
    async fn rotate(&self, config: &RotationConfig) -> RotationResult {
        rotate(config).await
    }
}

/// Perform one rotation attempt
pub async fn rotate(config: &RotationConfig) -> RotationResult {
    let mut tor = TorController::connect(&config.control_endpoint, config.control_timeout)
        .await
        .map_err(|e| RotationError::ControlUnreachable(format!("{:#}", e)))?;

    tor.authenticate(&config.control_secret)
        .await
        .map_err(|e| RotationError::AuthFailed(format!("{:#}", e)))?;

    tor.signal_newnym()
        .await
        .map_err(|e| RotationError::SignalFailed(format!("{:#}", e)))?;
    drop(tor);

    debug!("Waiting {:?} for the new circuit", config.settle_delay);
    tokio::time::sleep(config.settle_delay).await;

    let ip = probe_ip(config.gateway_proxy_port, &config.probe_url, config.probe_timeout)
        .await
        .map_err(|e| RotationError::ProbeFailed(format!("{:#}", e)))?;

    info!("Identity rotated, external IP is {}", ip);
    Ok(ip)
}

/// Fetch the external IP through the local gateway
pub async fn probe_ip(proxy_port: u16, url: &str, timeout: Duration) -> Result<String> {
    let proxy_url = format!("http://127.0.0.1:{}", proxy_port);

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::all(&proxy_url).context("Failed to configure gateway proxy")?)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request to {} via {} failed", url, proxy_url))?
        .error_for_status()?
        .text()
        .await
        .context("Failed to read probe response")?;

    let ip = body.trim();
    if ip.is_empty() {
        bail!("{} returned an empty body", url);
    }
    Ok(ip.to_string())
}
