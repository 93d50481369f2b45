//! Peer directory — enumerates reachable overlay addresses.
//!
//! The production directory shells out to the `tailscale` CLI; a failed or
//! missing CLI yields an empty peer set and is never fatal. The discovery
//! loop runs these queries off the async runtime since they block.

use std::net::IpAddr;
use std::process::Command;

/// Where the discovery loop learns which peers exist.
pub trait PeerDirectory: Send + Sync {
    /// This node's own overlay address, if the directory knows it.
    fn local_addr(&self) -> Option<IpAddr>;

    /// Addresses of the other reachable nodes, self excluded. Failure is
    /// reported as an empty set.
    fn peers(&self) -> Vec<IpAddr>;
}

/// Directory backed by the Tailscale CLI.
pub struct TailscaleDirectory;

impl TailscaleDirectory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TailscaleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerDirectory for TailscaleDirectory {
    fn local_addr(&self) -> Option<IpAddr> {
        let output = match Command::new("tailscale").args(["ip", "-4"]).output() {
            Ok(out) if out.status.success() => out.stdout,
            Ok(out) => {
                tracing::warn!(status = %out.status, "tailscale ip exited nonzero");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not run tailscale ip");
                return None;
            }
        };
        String::from_utf8_lossy(&output)
            .lines()
            .next()
            .and_then(|line| line.trim().parse().ok())
    }

    fn peers(&self) -> Vec<IpAddr> {
        let local = self.local_addr();
        let output = match Command::new("tailscale").arg("status").output() {
            Ok(out) if out.status.success() => out.stdout,
            Ok(out) => {
                tracing::warn!(status = %out.status, "tailscale status exited nonzero");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not run tailscale status");
                return Vec::new();
            }
        };
        extract_peer_addrs(&String::from_utf8_lossy(&output), local)
    }
}

/// Pull peer addresses out of `tailscale status` output: one node per
/// line, address in the first column. The local node's line is skipped.
fn extract_peer_addrs(output: &str, local: Option<IpAddr>) -> Vec<IpAddr> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|first| first.parse::<IpAddr>().ok())
        .filter(|addr| Some(*addr) != local)
        .collect()
}

/// Directory with a fixed roster. Used by tests and by nodes whose peer
/// set is maintained by hand instead of a mesh CLI.
pub struct StaticDirectory {
    local: Option<IpAddr>,
    peers: Vec<IpAddr>,
}

impl StaticDirectory {
    pub fn new(local: Option<IpAddr>, peers: Vec<IpAddr>) -> Self {
        Self { local, peers }
    }
}

impl PeerDirectory for StaticDirectory {
    fn local_addr(&self) -> Option<IpAddr> {
        self.local
    }

    fn peers(&self) -> Vec<IpAddr> {
        self.peers
            .iter()
            .copied()
            .filter(|addr| Some(*addr) != self.local)
            .collect()
    }
}
