//! Main scheduler loop

use crate::controller::{Phase, RotationController};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Periodic rotation loop.
///
/// Warm up, then rotate every `interval_secs` while enabled. Idles while
/// disabled and warms up again after being re-enabled, since the daemons
/// were just restarted. Exits once shutdown begins.
pub async fn rotation_loop(controller: Arc<RotationController>) {
    let warmup = controller.timings().warmup;
    let mut needs_warmup = true;

    info!("Rotation loop started");

    loop {
        match controller.phase().await {
            Phase::ShuttingDown => break,
            Phase::Disabled => {
                needs_warmup = true;
                controller.idle().await;
                continue;
            },
            Phase::Enabled => {},
        }

        if needs_warmup {
            needs_warmup = false;
            debug!("Warming up for {:?}", warmup);
            if !controller.wait_while_enabled(|_| warmup).await {
                continue;
            }
        }

        controller.rotate_scheduled().await;

        controller
            .wait_while_enabled(|state| Duration::from_secs(state.interval_secs))
            .await;
    }

    info!("Rotation loop stopped");
}
