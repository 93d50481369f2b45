//! Inbound heartbeat listener — the single task that marks peers live.

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use talkie_services::SharedRegistry;

/// Receive liveness datagrams on the heartbeat socket. Payload content is
/// not interpreted — any receipt counts, and the sender address is the
/// peer's identity.
pub async fn listener_loop(
    socket: UdpSocket,
    registry: SharedRegistry,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut buf = [0u8; 64];

    tracing::info!(addr = %socket.local_addr()?, "heartbeat listener starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("heartbeat listener shutting down");
                return Ok(());
            }

            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((_, from)) => registry.on_heartbeat_received(from.ip()),
                    Err(e) => tracing::warn!(error = %e, "heartbeat recv failed"),
                }
            }
        }
    }
}
