//! Integration tests for identity rotation
//!
//! Runs the real rotator against a fake Tor control port and a fake
//! gateway proxy, both listening on loopback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tor_rotator::config::{ControlEndpoint, RotationConfig};
use tor_rotator::rotation::rotate;
use tor_rotator::RotationError;

const PASSWORD: &str = "hunter2";

/// Fake control port accepting one password
struct FakeControlPort {
    endpoint: ControlEndpoint,
    newnym_count: Arc<AtomicUsize>,
}

async fn fake_control_port() -> FakeControlPort {
    scripted_control_port(Some(PASSWORD), "250 OK").await
}

/// Control port that accepts `password` (bare `AUTHENTICATE` when `None`)
/// and answers `SIGNAL NEWNYM` with `newnym_reply`
async fn scripted_control_port(
    password: Option<&str>,
    newnym_reply: &'static str,
) -> FakeControlPort {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let newnym_count = Arc::new(AtomicUsize::new(0));
    let expected = match password {
        Some(password) => format!(
            "AUTHENTICATE {}",
            data_encoding::HEXLOWER.encode(password.as_bytes())
        ),
        None => "AUTHENTICATE".to_string(),
    };

    let counter = Arc::clone(&newnym_count);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let counter = Arc::clone(&counter);
            let expected = expected.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                let mut authenticated = false;
                while let Ok(Some(line)) = lines.next_line().await {
                    let reply = if line.starts_with("AUTHENTICATE") {
                        if line == expected {
                            authenticated = true;
                            "250 OK".to_string()
                        } else {
                            let _ = write
                                .write_all(b"515 Authentication failed: Password did not match\r\n")
                                .await;
                            return;
                        }
                    } else if line == "SIGNAL NEWNYM" && authenticated {
                        counter.fetch_add(1, Ordering::SeqCst);
                        newnym_reply.to_string()
                    } else if !authenticated {
                        "514 Authentication required.".to_string()
                    } else {
                        "510 Unrecognized command".to_string()
                    };
                    if write.write_all(format!("{}\r\n", reply).as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    FakeControlPort {
        endpoint: ControlEndpoint {
            host: "127.0.0.1".to_string(),
            port,
        },
        newnym_count,
    }
}

/// Fake HTTP proxy answering every request with a fixed response
async fn fake_gateway(status: &'static str, body: &'static str) -> (u16, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (port, requests)
}

fn rotation_config(endpoint: ControlEndpoint, secret: &str, gateway_port: u16) -> RotationConfig {
    RotationConfig {
        control_endpoint: endpoint,
        control_secret: secret.to_string(),
        gateway_proxy_port: gateway_port,
        probe_url: "http://ip.test/".to_string(),
        control_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(10),
        probe_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_rotation_round_trip() {
    let control = fake_control_port().await;
    let (gateway_port, requests) = fake_gateway("200 OK", "1.2.3.4\n").await;

    let config = rotation_config(control.endpoint.clone(), PASSWORD, gateway_port);
    let result = rotate(&config).await;

    assert_eq!(result, Ok("1.2.3.4".to_string()));
    assert_eq!(control.newnym_count.load(Ordering::SeqCst), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_auth_skips_probe() {
    let control = fake_control_port().await;
    let (gateway_port, requests) = fake_gateway("200 OK", "1.2.3.4").await;

    let config = rotation_config(control.endpoint.clone(), "wrong-password", gateway_port);
    let result = rotate(&config).await;

    assert!(matches!(result, Err(RotationError::AuthFailed(_))));
    assert_eq!(control.newnym_count.load(Ordering::SeqCst), 0);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_control_port() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let (gateway_port, requests) = fake_gateway("200 OK", "1.2.3.4").await;

    let endpoint = ControlEndpoint {
        host: "127.0.0.1".to_string(),
        port,
    };
    let result = rotate(&rotation_config(endpoint, PASSWORD, gateway_port)).await;

    assert!(matches!(result, Err(RotationError::ControlUnreachable(_))));
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_probe_error_status() {
    let control = fake_control_port().await;
    let (gateway_port, _) = fake_gateway("503 Service Unavailable", "upstream down").await;

    let config = rotation_config(control.endpoint.clone(), PASSWORD, gateway_port);
    let result = rotate(&config).await;

    assert!(matches!(result, Err(RotationError::ProbeFailed(_))));
    // NEWNYM still went through before the probe failed
    assert_eq!(control.newnym_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_probe_empty_body() {
    let control = fake_control_port().await;
    let (gateway_port, _) = fake_gateway("200 OK", "  \n").await;

    let config = rotation_config(control.endpoint.clone(), PASSWORD, gateway_port);
    assert!(matches!(
        rotate(&config).await,
        Err(RotationError::ProbeFailed(_))
    ));
}

#[tokio::test]
async fn test_refused_newnym_skips_probe() {
    let control = scripted_control_port(Some(PASSWORD), "552 Unrecognized signal").await;
    let (gateway_port, requests) = fake_gateway("200 OK", "1.2.3.4").await;

    let config = rotation_config(control.endpoint.clone(), PASSWORD, gateway_port);
    let result = rotate(&config).await;

    match result {
        Err(RotationError::SignalFailed(reason)) => assert!(reason.contains("552")),
        other => panic!("expected SignalFailed, got {:?}", other),
    }
    assert_eq!(control.newnym_count.load(Ordering::SeqCst), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_secret_uses_null_auth() {
    let control = scripted_control_port(None, "250 OK").await;
    let (gateway_port, requests) = fake_gateway("200 OK", "5.6.7.8").await;

    let config = rotation_config(control.endpoint.clone(), "", gateway_port);
    let result = rotate(&config).await;

    assert_eq!(result, Ok("5.6.7.8".to_string()));
    assert_eq!(control.newnym_count.load(Ordering::SeqCst), 1);
    assert_eq!(requests.load(Ordering::SeqCst), 1);
}
