//! Discovery loop — reconciles the registry against the peer directory.
//!
//! Every discovery interval the directory is asked for the current peer
//! set and each reported address gets a beacon task if it lacks one.
//! Addresses that disappear from the directory are deliberately NOT
//! reaped: their beacons keep running and their liveness is governed
//! solely by the heartbeat protocol.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::broadcast;

use talkie_core::wire::DISCOVERY_INTERVAL;
use talkie_services::{PeerDirectory, SharedRegistry};

use crate::heartbeat;

pub async fn discovery_loop(
    registry: SharedRegistry,
    directory: Arc<dyn PeerDirectory>,
    heartbeat_port: u16,
    bind_addr: IpAddr,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown = shutdown_tx.subscribe();
    let mut interval = tokio::time::interval(DISCOVERY_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("discovery shutting down");
                return;
            }

            _ = interval.tick() => {
                // The directory query may shell out; keep it off the runtime.
                let dir = directory.clone();
                let reported = match tokio::task::spawn_blocking(move || dir.peers()).await {
                    Ok(peers) => peers,
                    Err(e) => {
                        tracing::warn!(error = %e, "directory query task failed");
                        continue;
                    }
                };

                for addr in reported {
                    registry.on_discovered(addr, || {
                        heartbeat::start_beacon(
                            addr,
                            heartbeat_port,
                            bind_addr,
                            shutdown_tx.subscribe(),
                        )
                    });
                }
            }
        }
    }
}
