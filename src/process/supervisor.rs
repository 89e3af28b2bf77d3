//! Supervised external process
//!
//! Owns at most one child process per value. Starting is idempotent and
//! stopping always leaves the handle cleared.

use crate::error::ProcessError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Windows: run without allocating a console window
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A daemon addressed by path and arguments
#[derive(Debug)]
pub struct SupervisedProcess {
    name: String,
    path: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl SupervisedProcess {
    /// Create an absent process. Nothing is launched until [`start`](Self::start).
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let path = path.into();
        Self {
            name: executable_name(&path),
            path,
            args,
            child: None,
        }
    }

    /// Executable file name, used in logs and errors
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// PID of the tracked process, if any
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Launch the process unless one is already running.
    ///
    /// Returns the PID of the running process, new or existing.
    pub fn start(&mut self) -> Result<Option<u32>, ProcessError> {
        if self.is_alive() {
            debug!("{} already running (pid {:?})", self.name, self.pid());
            return Ok(self.pid());
        }

        let mut cmd = Command::new(&self.path);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        match cmd.spawn() {
            Ok(child) => {
                let pid = child.id();
                info!("Started {} (pid {:?})", self.name, pid);
                self.child = Some(child);
                Ok(pid)
            },
            Err(source) => {
                error!("Failed to start {}: {}", self.name, source);
                Err(ProcessError::LaunchFailed {
                    name: self.name.clone(),
                    source,
                })
            },
        }
    }

    /// Poll liveness without blocking. An exited process is reaped and cleared.
    pub fn is_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("{} exited on its own with {}", self.name, status);
                self.child = None;
                false
            },
            Err(e) => {
                warn!("Failed to poll {}: {}", self.name, e);
                false
            },
        }
    }

    /// Stop the process: graceful request, wait up to `grace`, then kill.
    ///
    /// The handle is cleared on every path.
    pub async fn stop(&mut self, grace: Duration) {
        if !self.is_alive() {
            self.child = None;
            return;
        }
        let Some(mut child) = self.child.take() else {
            return;
        };

        info!("Stopping {} gracefully", self.name);
        request_terminate(&mut child);

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!("{} stopped ({})", self.name, status);
            },
            Ok(Err(e)) => {
                warn!("Failed waiting for {} to exit: {}, killing", self.name, e);
                force_kill(&self.name, &mut child).await;
            },
            Err(_) => {
                warn!(
                    "{} did not stop within {:?}, killing",
                    self.name, grace
                );
                force_kill(&self.name, &mut child).await;
            },
        }
    }
}

/// Ask the child to exit on its own
#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: pid belongs to a child we have not reaped yet
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            warn!(
                "SIGTERM to pid {} failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }
}

/// Windows has no polite signal for console-less children; TerminateProcess it is
#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to terminate pid {:?}: {}", child.id(), e);
    }
}

async fn force_kill(name: &str, child: &mut Child) {
    match child.kill().await {
        Ok(()) => info!("{} killed", name),
        Err(e) => error!("Failed to kill {}: {}", name, e),
    }
}

fn executable_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
