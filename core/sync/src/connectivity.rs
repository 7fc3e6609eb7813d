//! Network reachability gate run once before the sync loop starts.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Default endpoint probed for reachability.
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:443";
/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between failed probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Boolean reachability check with bounded latency.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the network is currently reachable.
    async fn is_reachable(&self) -> bool;
}

/// Probe that opens a TCP connection to a well-known host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Create a probe for `addr` (`host:port`), giving up after `timeout`.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Address being probed.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe to {} failed: {}", self.addr, e);
                false
            }
            Err(_) => {
                debug!("Probe to {} timed out after {:?}", self.addr, self.timeout);
                false
            }
        }
    }
}

/// Blocks until a [`ConnectivityProbe`] reports the network as reachable.
pub struct ConnectivityGate<P> {
    probe: P,
    poll_interval: Duration,
}

impl<P: ConnectivityProbe> ConnectivityGate<P> {
    /// Create a gate polling `probe` every `poll_interval` while unreachable.
    pub fn new(probe: P, poll_interval: Duration) -> Self {
        Self {
            probe,
            poll_interval,
        }
    }

    /// Wait until the probe succeeds.
    ///
    /// Never fails: an unreachable network is expected at startup and is
    /// simply waited out. Returns the number of probes it took.
    pub async fn wait(&self) -> u32 {
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            if self.probe.is_reachable().await {
                info!("Internet is on");
                return attempts;
            }
            warn!(
                "Internet is off, checking again in {:?}...",
                self.poll_interval
            );
            sleep(self.poll_interval).await;
        }
    }
}
