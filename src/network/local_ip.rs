//! Local address discovery.
//!
//! Candidates are ICE-style lines; the first token that parses as a
//! specified IP address wins. The native gatherer "connects" a UDP socket
//! toward a STUN host, which picks the outbound interface without sending a
//! packet, and reports that address as a host candidate.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use tokio::net::UdpSocket;

use crate::errors::SpeedTestError;

/// Reported when no candidate arrives in time.
pub const LOCAL_IP_PLACEHOLDER: &str = "192.168.1.x";

pub const DEFAULT_STUN_TARGET: &str = "stun.l.google.com:19302";

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(3000);

/// Source of ICE-style candidate lines.
pub trait CandidateGatherer: Send + Sync {
    fn gather(&self) -> BoxFuture<'_, Result<Vec<String>, SpeedTestError>>;
}

/// Gathers a host candidate from the OS routing decision.
#[derive(Debug, Clone)]
pub struct UdpCandidateGatherer {
    stun_target: String,
}

impl UdpCandidateGatherer {
    pub fn new(stun_target: impl Into<String>) -> Self {
        Self { stun_target: stun_target.into() }
    }

    async fn probe(&self, bind: &str) -> Result<SocketAddr, SpeedTestError> {
        let socket = UdpSocket::bind(bind).await.map_err(|e| {
            SpeedTestError::network(format!("could not bind {}", bind))
                .with_source(e)
        })?;

        socket.connect(self.stun_target.as_str()).await.map_err(|e| {
            SpeedTestError::network(format!(
                "no route toward {}",
                self.stun_target
            ))
            .with_source(e)
        })?;

        socket.local_addr().map_err(|e| {
            SpeedTestError::network("local address unavailable").with_source(e)
        })
    }
}

impl Default for UdpCandidateGatherer {
    fn default() -> Self {
        Self::new(DEFAULT_STUN_TARGET)
    }
}

impl CandidateGatherer for UdpCandidateGatherer {
    fn gather(&self) -> BoxFuture<'_, Result<Vec<String>, SpeedTestError>> {
        async move {
            let mut candidates = Vec::new();
            let mut last_error = None;

            for bind in ["0.0.0.0:0", "[::]:0"] {
                match self.probe(bind).await {
                    Ok(addr) => candidates.push(host_candidate(addr)),
                    Err(e) => {
                        debug!("Local address probe via {} failed: {}", bind, e);
                        last_error = Some(e);
                    }
                }
            }

            match (candidates.is_empty(), last_error) {
                (true, Some(e)) => Err(e),
                _ => Ok(candidates),
            }
        }
        .boxed()
    }
}

/// Format an address as a host candidate line.
pub fn host_candidate(addr: SocketAddr) -> String {
    format!(
        "candidate:1 1 udp 2122260223 {} {} typ host",
        addr.ip(),
        addr.port()
    )
}

/// First specified IP address in a candidate line.
pub fn parse_candidate_ip(candidate: &str) -> Option<IpAddr> {
    candidate
        .split_whitespace()
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .find(|ip| !ip.is_unspecified())
}

/// Resolve the local address, or [`LOCAL_IP_PLACEHOLDER`] after `timeout`.
pub async fn discover_local_ip(
    gatherer: &dyn CandidateGatherer,
    timeout: Duration,
) -> String {
    match tokio::time::timeout(timeout, gatherer.gather()).await {
        Ok(Ok(candidates)) => {
            let found = candidates
                .iter()
                .find_map(|candidate| parse_candidate_ip(candidate));

            match found {
                Some(ip) => ip.to_string(),
                None => {
                    debug!("No usable local address candidate");
                    LOCAL_IP_PLACEHOLDER.to_string()
                }
            }
        }
        Ok(Err(e)) => {
            debug!("Local address discovery failed: {}", e);
            LOCAL_IP_PLACEHOLDER.to_string()
        }
        Err(_) => {
            debug!("Local address discovery timed out after {:?}", timeout);
            LOCAL_IP_PLACEHOLDER.to_string()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Gatherer returning a fixed result, optionally after a delay.
    pub struct StaticGatherer {
        pub candidates: Vec<String>,
        pub delay: Duration,
    }

    impl StaticGatherer {
        pub fn new(candidates: &[&str]) -> Self {
            Self {
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
                delay: Duration::ZERO,
            }
        }

        pub fn never() -> Self {
            Self { candidates: Vec::new(), delay: Duration::from_secs(3600) }
        }
    }

    impl CandidateGatherer for StaticGatherer {
        fn gather(
            &self,
        ) -> BoxFuture<'_, Result<Vec<String>, SpeedTestError>> {
            async move {
                tokio::time::sleep(self.delay).await;
                Ok(self.candidates.clone())
            }
            .boxed()
        }
    }
}
