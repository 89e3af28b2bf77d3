//! Tests for the rotation controller
//!
//! Uses `sleep` as a stand-in for both daemons and a scripted rotator, so
//! no Tor or network access is needed.

#![cfg(unix)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tor_rotator::config::{ControlEndpoint, RotationConfig, Timings};
use tor_rotator::process::SupervisedProcess;
use tor_rotator::proxy::system::DisabledProxy;
use tor_rotator::proxy::ProxyGateway;
use tor_rotator::rotation::{Rotate, RotationResult};
use tor_rotator::state::IpStatus;
use tor_rotator::{CommandError, Daemons, RotationController, RotationError};

/// Rotator that counts calls, takes `delay`, and returns a fixed result
struct ScriptedRotator {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    result: RotationResult,
}

#[async_trait]
impl Rotate for ScriptedRotator {
    async fn rotate(&self, _config: &RotationConfig) -> RotationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.result.clone()
    }
}

struct Harness {
    controller: Arc<RotationController>,
    calls: Arc<AtomicUsize>,
}

fn rotation_config() -> RotationConfig {
    RotationConfig {
        control_endpoint: ControlEndpoint {
            host: "127.0.0.1".to_string(),
            port: 9051,
        },
        control_secret: String::new(),
        gateway_proxy_port: 7890,
        probe_url: "http://ip.test/".to_string(),
        control_timeout: Duration::from_secs(1),
        settle_delay: Duration::ZERO,
        probe_timeout: Duration::from_secs(1),
    }
}

fn daemon() -> SupervisedProcess {
    SupervisedProcess::new("sleep", vec!["30".to_string()])
}

fn harness(warmup: Duration, interval_secs: u64, delay: Duration, result: RotationResult) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let rotator = ScriptedRotator {
        calls: Arc::clone(&calls),
        delay,
        result,
    };
    let daemons = Daemons {
        tor: daemon(),
        gateway: ProxyGateway::new(daemon(), Box::new(DisabledProxy)),
    };
    let timings = Timings {
        warmup,
        wait_slice: Duration::from_millis(50),
        stop_grace: Duration::from_secs(2),
    };

    Harness {
        controller: RotationController::new(
            rotation_config(),
            timings,
            interval_secs,
            daemons,
            Arc::new(rotator),
        ),
        calls,
    }
}

/// Harness whose loop never reaches its first scheduled rotation
fn quiet_harness(delay: Duration) -> Harness {
    harness(
        Duration::from_secs(3600),
        60,
        delay,
        Ok("10.0.0.1".to_string()),
    )
}

async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[tokio::test]
async fn test_set_interval_accepts_valid_range() {
    let h = quiet_harness(Duration::ZERO);

    for secs in [3, 4, 60, 1800, 3599, 3600] {
        h.controller.set_interval(secs).await.unwrap();
        assert_eq!(h.controller.snapshot().interval_secs, secs);
    }
}

#[tokio::test]
async fn test_set_interval_rejects_out_of_range() {
    let h = quiet_harness(Duration::ZERO);
    h.controller.set_interval(120).await.unwrap();

    for secs in [0, 1, 2, 3601, u64::MAX] {
        let err = h.controller.set_interval(secs).await.unwrap_err();
        assert!(matches!(err, CommandError::InvalidInterval { value, .. } if value == secs));
        assert_eq!(h.controller.snapshot().interval_secs, 120);
    }
}

#[tokio::test]
async fn test_rotate_now_while_disabled() {
    let h = quiet_harness(Duration::ZERO);

    assert_eq!(
        h.controller.rotate_now().await,
        Err(CommandError::RotationDisabled)
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.controller.snapshot().ip, IpStatus::Unknown);
}

#[tokio::test]
async fn test_concurrent_rotate_now_runs_once() {
    let h = quiet_harness(Duration::from_millis(300));
    h.controller.launch().await;

    assert_eq!(h.controller.rotate_now().await, Ok(true));
    assert_eq!(h.controller.rotate_now().await, Ok(false));
    assert!(h.controller.snapshot().rotation_in_flight);
    assert_eq!(h.controller.snapshot().ip, IpStatus::Rotating);

    let controller = Arc::clone(&h.controller);
    assert!(
        eventually(Duration::from_secs(3), || !controller.snapshot().rotation_in_flight).await
    );
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.controller.snapshot().ip,
        IpStatus::Known("10.0.0.1".to_string())
    );

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_toggle_stops_and_starts_daemons() {
    let h = quiet_harness(Duration::ZERO);
    h.controller.launch().await;

    let status = h.controller.daemon_status().await;
    assert!(status.tor_alive && status.gateway_alive);
    assert_eq!(status.system_proxy_port, Some(7890));

    assert!(!h.controller.toggle_enabled().await);
    assert!(!h.controller.snapshot().enabled);
    assert!(h.controller.daemon_status().await.all_stopped());

    assert!(h.controller.toggle_enabled().await);
    assert!(h.controller.snapshot().enabled);
    let status = h.controller.daemon_status().await;
    assert!(status.tor_alive && status.gateway_alive);
    assert_eq!(status.system_proxy_port, Some(7890));

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_rotate_now_rejected_after_toggle_off() {
    let h = quiet_harness(Duration::ZERO);
    h.controller.launch().await;
    h.controller.toggle_enabled().await;

    assert_eq!(
        h.controller.rotate_now().await,
        Err(CommandError::RotationDisabled)
    );
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_with_rotation_in_flight() {
    let h = quiet_harness(Duration::from_secs(1));
    h.controller.launch().await;
    assert_eq!(h.controller.rotate_now().await, Ok(true));

    let started = Instant::now();
    h.controller.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(h.controller.daemon_status().await.all_stopped());

    let state = h.controller.snapshot();
    assert!(state.shutting_down);
    assert!(!state.enabled);

    // Commands are refused once shut down
    assert_eq!(
        h.controller.rotate_now().await,
        Err(CommandError::RotationDisabled)
    );
    assert!(!h.controller.toggle_enabled().await);
}

#[tokio::test]
async fn test_launch_after_shutdown_is_ignored() {
    let h = quiet_harness(Duration::ZERO);
    h.controller.launch().await;
    h.controller.shutdown().await;

    h.controller.launch().await;

    assert!(h.controller.daemon_status().await.all_stopped());
    assert!(!h.controller.snapshot().enabled);
    assert_eq!(
        h.controller.rotate_now().await,
        Err(CommandError::RotationDisabled)
    );
}

#[tokio::test]
async fn test_shutdown_before_launch_blocks_launch() {
    let h = quiet_harness(Duration::ZERO);
    h.controller.shutdown().await;
    h.controller.launch().await;

    assert!(h.controller.daemon_status().await.all_stopped());
    assert!(!h.controller.snapshot().enabled);
}

#[tokio::test]
async fn test_scheduled_rotation_after_warmup() {
    let h = harness(
        Duration::from_millis(50),
        3600,
        Duration::ZERO,
        Ok("1.2.3.4".to_string()),
    );
    h.controller.launch().await;

    let controller = Arc::clone(&h.controller);
    assert!(
        eventually(Duration::from_secs(2), || {
            controller.snapshot().ip == IpStatus::Known("1.2.3.4".to_string())
        })
        .await
    );
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.snapshot().rotations_succeeded, 1);

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_failed_rotation_reports_error_and_loop_continues() {
    let h = harness(
        Duration::from_millis(50),
        3600,
        Duration::ZERO,
        Err(RotationError::ProbeFailed("timed out".to_string())),
    );
    h.controller.launch().await;

    let controller = Arc::clone(&h.controller);
    assert!(eventually(Duration::from_secs(2), || controller.snapshot().ip == IpStatus::Error).await);
    let state = h.controller.snapshot();
    assert!(state.last_error.unwrap().contains("timed out"));
    assert_eq!(state.rotations_failed, 1);

    // Manual retry still possible after a failure
    assert_eq!(h.controller.rotate_now().await, Ok(true));
    let calls = Arc::clone(&h.calls);
    assert!(eventually(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 2).await);

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_disable_abandons_interval_wait() {
    let h = harness(
        Duration::from_millis(50),
        3600,
        Duration::ZERO,
        Ok("1.2.3.4".to_string()),
    );
    h.controller.launch().await;

    let calls = Arc::clone(&h.calls);
    assert!(eventually(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 1).await);

    // Off and on again: the hour-long wait is dropped and a fresh warmup
    // leads straight to the next rotation
    h.controller.toggle_enabled().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.controller.toggle_enabled().await;

    let calls = Arc::clone(&h.calls);
    assert!(eventually(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 2).await);

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_shorter_interval_applies_to_current_wait() {
    let h = harness(
        Duration::from_millis(50),
        3600,
        Duration::ZERO,
        Ok("1.2.3.4".to_string()),
    );
    h.controller.launch().await;

    let calls = Arc::clone(&h.calls);
    assert!(eventually(Duration::from_secs(2), || calls.load(Ordering::SeqCst) == 1).await);

    h.controller.set_interval(3).await.unwrap();

    let calls = Arc::clone(&h.calls);
    assert!(eventually(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 2).await);

    h.controller.shutdown().await;
}

#[tokio::test]
async fn test_subscribers_see_state_changes() {
    let h = quiet_harness(Duration::ZERO);
    let mut updates = h.controller.subscribe();

    h.controller.launch().await;
    tokio::time::timeout(Duration::from_secs(1), updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(updates.borrow_and_update().enabled);

    h.controller.set_interval(30).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), updates.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updates.borrow_and_update().interval_secs, 30);

    h.controller.shutdown().await;
}
