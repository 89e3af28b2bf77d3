//! Tor Control Port client
//!
//! Communicates with the local Tor daemon via the control protocol.
//! Only the commands needed for identity rotation are implemented.

use crate::config::ControlEndpoint;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Common cookie file locations
const COOKIE_PATHS: &[&str] = &[
    "/run/tor/control.authcookie",
    "/var/run/tor/control.authcookie",
    "/var/lib/tor/control_auth_cookie",
];

/// Connection to Tor control port
pub struct TorController {
    stream: BufReader<TcpStream>,
    authenticated: bool,
    timeout: Duration,
}

impl TorController {
    /// Open a connection to the control port without authenticating.
    ///
    /// `timeout` bounds the connect as well as every later command.
    pub async fn connect(endpoint: &ControlEndpoint, timeout: Duration) -> Result<Self> {
        let addr = endpoint.to_string();
        debug!("Connecting to Tor control port: {}", addr);

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .with_context(|| format!("Timed out connecting to Tor at {}", addr))?
            .with_context(|| format!("Failed to connect to Tor at {}", addr))?;

        Ok(Self {
            stream: BufReader::new(stream),
            authenticated: false,
            timeout,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Authenticate with the configured secret.
    ///
    /// A non-empty secret is sent as a hex-encoded password. An empty one
    /// falls back to cookie authentication, then null authentication.
    pub async fn authenticate(&mut self, secret: &str) -> Result<()> {
        if secret.is_empty() {
            self.authenticate_cookie().await
        } else {
            self.authenticate_password(secret).await
        }
    }

    /// Authenticate with password (hex-encoded for HashedControlPassword)
    async fn authenticate_password(&mut self, password: &str) -> Result<()> {
        let password_hex = data_encoding::HEXLOWER.encode(password.as_bytes());
        let cmd = format!("AUTHENTICATE {}\r\n", password_hex);
        self.send_command(&cmd).await?;
        self.authenticated = true;
        Ok(())
    }

    /// Authenticate with cookie file
    async fn authenticate_cookie(&mut self) -> Result<()> {
        for path in COOKIE_PATHS {
            if let Ok(cookie) = std::fs::read(path) {
                let cookie_hex = data_encoding::HEXLOWER.encode(&cookie);
                let cmd = format!("AUTHENTICATE {}\r\n", cookie_hex);
                match self.send_command(&cmd).await {
                    Ok(_) => {
                        self.authenticated = true;
                        debug!("Authenticated with cookie from {}", path);
                        return Ok(());
                    },
                    Err(e) => {
                        debug!("Cookie auth failed with {}: {}", path, e);
                        // Tor closes the connection after a failed AUTHENTICATE
                        bail!("Cookie authentication rejected: {}", e);
                    },
                }
            }
        }

        // Fallback: null authentication (works if no auth configured)
        debug!("Trying null authentication");
        self.send_command("AUTHENTICATE\r\n").await?;
        self.authenticated = true;
        Ok(())
    }

    /// Ask Tor to switch to clean circuits for new connections
    pub async fn signal_newnym(&mut self) -> Result<()> {
        if !self.authenticated {
            bail!("Not authenticated");
        }
        self.send_command("SIGNAL NEWNYM\r\n").await?;
        debug!("NEWNYM accepted");
        Ok(())
    }

    /// Send a command and read the reply up to its final line.
    ///
    /// Returns the reply without the final `250 OK`. Any `4xx`/`5xx` status
    /// becomes an error carrying the reply text.
    async fn send_command(&mut self, cmd: &str) -> Result<String> {
        let verb = cmd.split_whitespace().next().unwrap_or_default();
        debug!("Sending Tor command: {}", verb);

        let stream = self.stream.get_mut();
        stream.write_all(cmd.as_bytes()).await?;
        stream.flush().await?;

        let mut response = String::new();
        loop {
            let mut line = String::new();
            let bytes_read =
                match tokio::time::timeout(self.timeout, self.stream.read_line(&mut line)).await {
                    Ok(result) => result?,
                    Err(_) => bail!("Timeout waiting for Tor response to {}", verb),
                };

            if bytes_read == 0 {
                bail!("Tor closed the control connection during {}", verb);
            }

            // "250-" and "250+" continue the reply, "NNN " ends it
            if is_final_line(&line) {
                if !line.starts_with('2') {
                    response.push_str(&line);
                    bail!("Tor control error: {}", response.trim());
                }
                break;
            }

            response.push_str(&line);
        }

        Ok(response)
    }
}

/// A reply line of the form `NNN <text>`
fn is_final_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b' '
}
