//! Node wiring — binds the well-known sockets, spawns every task, and
//! owns the shutdown fan-out. Shared between main and the integration
//! tests so a whole node can be started and stopped in-process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use talkie_core::config::TalkieConfig;
use talkie_core::wire::STALENESS_TIMEOUT;
use talkie_services::{
    new_registry, CaptureDevice, Panel, PeerDirectory, PlaybackDevice, SharedRegistry,
};

use crate::{discovery, downlink, heartbeat, uplink};

/// The external collaborators a node runs against. Absent audio devices
/// disable the corresponding direction; the node itself keeps running.
pub struct NodeDevices {
    pub capture: Option<Box<dyn CaptureDevice>>,
    pub playback: Option<Box<dyn PlaybackDevice>>,
    pub panel: Arc<dyn Panel>,
    pub directory: Arc<dyn PeerDirectory>,
}

/// A running node. Dropping it without calling [`Node::shutdown`] leaves
/// blocking tasks to wind down on their own; shutdown is deterministic.
pub struct Node {
    registry: SharedRegistry,
    shutdown_tx: broadcast::Sender<()>,
    stop: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    heartbeat_addr: SocketAddr,
    audio_addr: SocketAddr,
}

/// Bind the listening sockets and spawn the full task set. Failure to
/// bind either well-known socket is fatal.
pub async fn spawn(config: &TalkieConfig, devices: NodeDevices) -> Result<Node> {
    let bind_addr = config.network.bind_addr;

    let heartbeat_socket = UdpSocket::bind((bind_addr, config.network.heartbeat_port))
        .await
        .context("failed to bind heartbeat socket")?;
    let audio_socket = UdpSocket::bind((bind_addr, config.network.audio_port))
        .await
        .context("failed to bind audio socket")?;
    let heartbeat_addr = heartbeat_socket.local_addr()?;
    let audio_addr = audio_socket.local_addr()?;

    let registry = new_registry(audio_addr.port());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let stop = Arc::new(AtomicBool::new(false));
    let gate = Arc::new(AtomicBool::new(false));

    let mut tasks = Vec::new();

    tasks.push({
        let registry = registry.clone();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = heartbeat::listener_loop(heartbeat_socket, registry, shutdown).await {
                tracing::error!(error = %e, "heartbeat listener failed");
            }
        })
    });

    tasks.push(tokio::spawn(heartbeat::sweep_loop(
        registry.clone(),
        devices.panel.clone(),
        shutdown_tx.subscribe(),
    )));

    tasks.push(tokio::spawn(discovery::discovery_loop(
        registry.clone(),
        devices.directory,
        heartbeat_addr.port(),
        bind_addr,
        shutdown_tx.clone(),
    )));

    tasks.push(tokio::spawn(uplink::gate_poll_loop(
        devices.panel,
        gate.clone(),
        shutdown_tx.subscribe(),
    )));

    match devices.capture {
        Some(capture) => {
            let frame_samples = config.audio.frame_samples;
            let gate = gate.clone();
            let registry = registry.clone();
            let stop = stop.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                uplink::uplink_loop(capture, frame_samples, gate, registry, stop)
            }));
        }
        None => tracing::info!("no capture device, transmit disabled"),
    }

    match devices.playback {
        Some(playback) => {
            let frame_samples = config.audio.frame_samples;
            let shutdown = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                if let Err(e) =
                    downlink::downlink_loop(audio_socket, playback, frame_samples, shutdown).await
                {
                    tracing::error!(error = %e, "audio receiver failed");
                }
            }));
        }
        None => {
            tracing::info!("no playback device, receive disabled");
            // Keep the well-known port claimed and its kernel buffer empty.
            let mut shutdown = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                loop {
                    tokio::select! {
                        _ = shutdown.recv() => return,
                        _ = audio_socket.recv_from(&mut buf) => {}
                    }
                }
            }));
        }
    }

    tasks.push({
        let registry = registry.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = shutdown.recv() => return,
                    _ = interval.tick() => {
                        let stats = registry.stats(STALENESS_TIMEOUT);
                        tracing::info!(
                            known = stats.known,
                            linked = stats.linked,
                            live = stats.live,
                            "peer registry snapshot"
                        );
                    }
                }
            }
        })
    });

    tracing::info!(%heartbeat_addr, %audio_addr, "node running");

    Ok(Node {
        registry,
        shutdown_tx,
        stop,
        tasks,
        heartbeat_addr,
        audio_addr,
    })
}

impl Node {
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Actual heartbeat listening address (useful when the config asked
    /// for an ephemeral port).
    pub fn heartbeat_addr(&self) -> SocketAddr {
        self.heartbeat_addr
    }

    pub fn audio_addr(&self) -> SocketAddr {
        self.audio_addr
    }

    /// Stop every task and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        self.stop.store(true, Ordering::Relaxed);
        self.registry.cancel_beacons();
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("node stopped");
    }
}
