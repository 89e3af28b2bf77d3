//! System-wide proxy backends
//!
//! Each backend points the desktop's HTTP(S) proxy at `127.0.0.1:<port>`
//! or turns it off again.

use crate::config::SystemProxyMode;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

const INTERNET_SETTINGS: &str =
    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Internet Settings";

/// Enable or disable the host's system proxy
#[async_trait]
pub trait SystemProxy: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Point the system proxy at `127.0.0.1:port`
    async fn enable(&self, port: u16) -> Result<()>;

    /// Turn the system proxy off
    async fn disable(&self) -> Result<()>;
}

/// Build the backend selected by configuration
pub fn from_mode(mode: SystemProxyMode) -> Box<dyn SystemProxy> {
    match mode {
        SystemProxyMode::Auto => platform_default(),
        SystemProxyMode::Windows => Box::new(WindowsRegistryProxy),
        SystemProxyMode::Gnome => Box::new(GnomeProxy),
        SystemProxyMode::Off => Box::new(DisabledProxy),
    }
}

/// Registry on Windows, gsettings on Linux, nothing elsewhere
pub fn platform_default() -> Box<dyn SystemProxy> {
    if cfg!(windows) {
        Box::new(WindowsRegistryProxy)
    } else if cfg!(target_os = "linux") {
        Box::new(GnomeProxy)
    } else {
        Box::new(DisabledProxy)
    }
}

/// WinINet settings under HKCU, as used by browsers and most apps
pub struct WindowsRegistryProxy;

#[async_trait]
impl SystemProxy for WindowsRegistryProxy {
    fn name(&self) -> &'static str {
        "windows-registry"
    }

    async fn enable(&self, port: u16) -> Result<()> {
        reg_add("ProxyEnable", "REG_DWORD", "1").await?;
        reg_add("ProxyServer", "REG_SZ", &format!("127.0.0.1:{}", port)).await?;
        info!("System proxy enabled (127.0.0.1:{})", port);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        reg_add("ProxyEnable", "REG_DWORD", "0").await?;
        info!("System proxy disabled");
        Ok(())
    }
}

async fn reg_add(value: &str, kind: &str, data: &str) -> Result<()> {
    run_tool(
        "reg",
        &["add", INTERNET_SETTINGS, "/v", value, "/t", kind, "/d", data, "/f"],
    )
    .await
}

/// GNOME desktop proxy via gsettings
pub struct GnomeProxy;

#[async_trait]
impl SystemProxy for GnomeProxy {
    fn name(&self) -> &'static str {
        "gnome"
    }

    async fn enable(&self, port: u16) -> Result<()> {
        let port = port.to_string();
        for schema in ["org.gnome.system.proxy.http", "org.gnome.system.proxy.https"] {
            run_tool("gsettings", &["set", schema, "host", "127.0.0.1"]).await?;
            run_tool("gsettings", &["set", schema, "port", &port]).await?;
        }
        run_tool("gsettings", &["set", "org.gnome.system.proxy", "mode", "manual"]).await?;
        info!("System proxy enabled (127.0.0.1:{})", port);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        run_tool("gsettings", &["set", "org.gnome.system.proxy", "mode", "none"]).await?;
        info!("System proxy disabled");
        Ok(())
    }
}

/// Leaves the system proxy alone
pub struct DisabledProxy;

#[async_trait]
impl SystemProxy for DisabledProxy {
    fn name(&self) -> &'static str {
        "off"
    }

    async fn enable(&self, port: u16) -> Result<()> {
        debug!("System proxy management off, not pointing at port {}", port);
        Ok(())
    }

    async fn disable(&self) -> Result<()> {
        Ok(())
    }
}

/// Run a settings tool without a console window and require success
async fn run_tool(program: &str, args: &[&str]) -> Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args);

    #[cfg(windows)]
    cmd.creation_flags(0x0800_0000);

    let output = cmd
        .output()
        .await
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        bail!(
            "{} {} failed with {}: {}",
            program,
            args.first().copied().unwrap_or_default(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
