//! Outbound liveness beacon, one task per peer.

use std::net::{IpAddr, SocketAddr};

use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use talkie_core::wire::{BEACON_INTERVAL, BEACON_PAYLOAD};
use talkie_services::BeaconHandle;

/// Spawn a beacon task for `peer` and hand back its abort handle.
///
/// `bind_addr` pins the source address of the beacons — the listener on
/// the far side identifies us by it.
pub fn start_beacon(
    peer: IpAddr,
    heartbeat_port: u16,
    bind_addr: IpAddr,
    shutdown: broadcast::Receiver<()>,
) -> BeaconHandle {
    let endpoint = SocketAddr::new(peer, heartbeat_port);
    BeaconHandle::new(tokio::spawn(beacon_loop(endpoint, bind_addr, shutdown)))
}

/// Send a liveness datagram to `peer` every beacon interval until
/// cancelled. Send failures are logged and the cadence continues — loss
/// is masked by periodicity, not retries.
pub async fn beacon_loop(
    peer: SocketAddr,
    bind_addr: IpAddr,
    mut shutdown: broadcast::Receiver<()>,
) {
    let socket = match UdpSocket::bind(SocketAddr::new(bind_addr, 0)).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!(%peer, error = %e, "beacon socket bind failed");
            return;
        }
    };
    if let Err(e) = socket.connect(peer).await {
        tracing::error!(%peer, error = %e, "beacon dial failed");
        return;
    }

    tracing::info!(%peer, "beaconing");
    let mut interval = tokio::time::interval(BEACON_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!(%peer, "beacon shutting down");
                return;
            }

            _ = interval.tick() => {
                if let Err(e) = socket.send(&BEACON_PAYLOAD).await {
                    tracing::warn!(%peer, error = %e, "beacon send failed");
                }
            }
        }
    }
}
