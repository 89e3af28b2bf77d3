//! Line-oriented console front-end
//!
//! Reads commands from stdin and forwards them to the controller; prints
//! status changes as they are published.

use crate::controller::RotationController;
use crate::state::ControllerState;
use crate::util::time::{format_age, format_duration};
use anyhow::{Context, Result};
use std::future::Future;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Toggle,
    Interval(u64),
    Rotate,
    Help,
    Quit,
}

/// Parse one line of console input
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "status" | "s" => ConsoleCommand::Status,
        "toggle" | "t" => ConsoleCommand::Toggle,
        "rotate" | "r" => ConsoleCommand::Rotate,
        "help" | "h" | "?" => ConsoleCommand::Help,
        "quit" | "q" | "exit" => ConsoleCommand::Quit,
        "interval" | "i" => {
            let value = words
                .next()
                .ok_or_else(|| "usage: interval <seconds>".to_string())?;
            let secs = value
                .parse::<u64>()
                .map_err(|_| format!("not a whole number of seconds: {}", value))?;
            ConsoleCommand::Interval(secs)
        },
        other => return Err(format!("unknown command: {} (try 'help')", other)),
    };

    if words.next().is_some() {
        return Err(format!("too many arguments for {}", verb));
    }
    Ok(command)
}

/// Read commands until `quit`, EOF or a shutdown signal
pub async fn run_console(controller: &Arc<RotationController>) -> Result<()> {
    let mut lines = spawn_stdin_reader()?;
    print_help();
    drive_console(controller, &mut lines, super::run::shutdown_signal()).await;
    Ok(())
}

/// Forward stdin lines from a plain OS thread.
///
/// A read parked on `tokio::io::stdin` cannot be cancelled and would hold
/// the runtime open until the next newline.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    },
                    Err(e) => {
                        debug!("stdin read failed: {}", e);
                        return;
                    },
                }
            }
        })
        .context("Failed to start console reader thread")?;
    Ok(rx)
}

/// Dispatch console lines until `quit`, end of input or `shutdown` resolves
async fn drive_console<F>(
    controller: &Arc<RotationController>,
    lines: &mut mpsc::Receiver<String>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            () = &mut shutdown => break,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(ConsoleCommand::Status) => {
                print_status(&controller.snapshot());
                let daemons = controller.daemon_status().await;
                println!(
                    "  tor: {}  gateway: {}  system proxy: {}",
                    up_down(daemons.tor_alive),
                    up_down(daemons.gateway_alive),
                    daemons
                        .system_proxy_port
                        .map(|p| format!("127.0.0.1:{}", p))
                        .unwrap_or_else(|| "off".to_string())
                );
            },
            Ok(ConsoleCommand::Toggle) => {
                let enabled = controller.toggle_enabled().await;
                println!("Rotation {}", if enabled { "enabled" } else { "disabled" });
            },
            Ok(ConsoleCommand::Interval(secs)) => match controller.set_interval(secs).await {
                Ok(()) => println!("Interval set to {}", format_duration(secs)),
                Err(e) => println!("{}", e),
            },
            Ok(ConsoleCommand::Rotate) => match controller.rotate_now().await {
                Ok(true) => println!("Rotating..."),
                Ok(false) => println!("A rotation is already in progress"),
                Err(e) => println!("{}, toggle it on first", e),
            },
            Ok(ConsoleCommand::Help) => print_help(),
            Ok(ConsoleCommand::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }
}

/// One-line summary of controller state
pub fn print_status(state: &ControllerState) {
    println!(
        "IP: {}  rotation: {}  interval: {}",
        state.ip,
        if state.enabled { "on" } else { "off" },
        format_duration(state.interval_secs)
    );
    if state.rotations_succeeded + state.rotations_failed > 0 {
        println!(
            "  rotations: {} ok, {} failed, last {}",
            state.rotations_succeeded,
            state.rotations_failed,
            format_age(state.since_last_rotation())
        );
    }
    if let Some(err) = &state.last_error {
        println!("  last error: {}", err);
    }
}

fn up_down(alive: bool) -> &'static str {
    if alive {
        "running"
    } else {
        "stopped"
    }
}

fn print_help() {
    println!("Commands: status | toggle | interval <seconds> | rotate | help | quit");
}
