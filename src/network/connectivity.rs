//! Online/offline signal.
//!
//! Reachability of a well-known TCP endpoint stands in for the platform's
//! online flag. A background task re-probes on an interval and publishes
//! changes through a `watch` channel.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cloudflare's public resolver, HTTPS port.
pub const DEFAULT_PROBE_ADDR: SocketAddr = SocketAddr::V4(
    std::net::SocketAddrV4::new(std::net::Ipv4Addr::new(1, 1, 1, 1), 443),
);

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Whether a TCP connection to `addr` succeeds within `timeout`.
pub async fn probe_online(addr: SocketAddr, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Connectivity probe to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Connectivity probe to {} timed out", addr);
            false
        }
    }
}

/// Probe once, then every `interval`, publishing changes.
///
/// The task ends when every receiver has been dropped.
pub fn watch_connectivity(
    addr: SocketAddr,
    interval: Duration,
    timeout: Duration,
) -> (watch::Receiver<bool>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(true);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let online = probe_online(addr, timeout).await;
            let changed = tx.send_if_modified(|current| {
                if *current != online {
                    *current = online;
                    true
                } else {
                    false
                }
            });

            if changed {
                info!(
                    "Connection is now {}",
                    if online { "online" } else { "offline" }
                );
            }

            if tx.is_closed() {
                break;
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_probe_open_port_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(probe_online(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_closed_port_is_offline() {
        let addr = closed_port().await;
        assert!(!probe_online(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_watch_reports_offline() {
        let addr = closed_port().await;
        let (mut rx, handle) = watch_connectivity(
            addr,
            Duration::from_millis(10),
            Duration::from_millis(200),
        );

        rx.changed().await.unwrap();
        assert!(!*rx.borrow());

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
