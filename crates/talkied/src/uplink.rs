//! Uplink streamer — fans captured audio out to every live peer while the
//! talk gate is held.
//!
//! Runs on a blocking thread: the capture read blocks until the device
//! fills a frame. The talk gate itself is refreshed by a separate 10Hz
//! poll task so the streamer never touches panel hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::broadcast;

use talkie_core::wire::{self, GATE_POLL_INTERVAL};
use talkie_services::{CaptureDevice, Panel, SharedRegistry};

/// Refresh the talk gate from the panel button at 10Hz.
pub async fn gate_poll_loop(
    panel: Arc<dyn Panel>,
    gate: Arc<AtomicBool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(GATE_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("gate poll shutting down");
                return;
            }

            _ = interval.tick() => {
                gate.store(panel.talk_pressed(), Ordering::Relaxed);
            }
        }
    }
}

/// Read frames from the capture device while the gate is held and send
/// each one to every open audio link. A send failure to one peer must not
/// keep the frame from the rest. A capture failure ends this task only.
pub fn uplink_loop(
    mut capture: Box<dyn CaptureDevice>,
    frame_samples: usize,
    gate: Arc<AtomicBool>,
    registry: SharedRegistry,
    stop: Arc<AtomicBool>,
) {
    let mut frame = vec![0i16; frame_samples];

    tracing::info!("uplink streamer starting");
    while !stop.load(Ordering::Relaxed) {
        if !gate.load(Ordering::Relaxed) {
            thread::sleep(GATE_POLL_INTERVAL);
            continue;
        }

        if let Err(e) = capture.read_frame(&mut frame) {
            tracing::error!(error = %e, "capture read failed, uplink stopping");
            return;
        }

        let payload = wire::encode_frame(&frame);
        for link in registry.snapshot_audio_links() {
            if let Err(e) = link.send(&payload) {
                tracing::warn!(peer = ?link.peer_addr(), error = %e, "audio send failed");
            }
        }
    }
    tracing::info!("uplink streamer shutting down");
}
