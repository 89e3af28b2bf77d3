//! `run` command: the long-running rotator

use super::console::{print_status, run_console};
use super::RunArgs;
use crate::config;
use crate::controller::RotationController;
use crate::state::IpStatus;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// Run the rotator until quit or a shutdown signal
pub async fn run_daemon(config_path: &Path, args: &RunArgs) -> Result<()> {
    info!("tor-rotator v{} starting", crate::VERSION);

    let config = config::load_from_path(config_path)?;
    let controller = RotationController::from_config(&config);
    controller.launch().await;

    // Echo IP and on/off changes; intermediate bookkeeping is not interesting
    let mut updates = controller.subscribe();
    let printer = tokio::spawn(async move {
        let mut shown: Option<(bool, IpStatus)> = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            let key = (state.enabled, state.ip.clone());
            if shown.as_ref() != Some(&key) {
                print_status(&state);
                shown = Some(key);
            }
        }
    });

    if args.headless {
        shutdown_signal().await;
    } else if let Err(e) = run_console(&controller).await {
        warn!("Console unavailable, running headless: {:#}", e);
        shutdown_signal().await;
    }

    controller.shutdown().await;
    printer.abort();
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix
pub(super) async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
                return;
            },
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
