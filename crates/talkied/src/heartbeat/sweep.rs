//! Liveness sweep — demotes stale peers and drives the panel lights.

use std::sync::Arc;

use tokio::sync::broadcast;

use talkie_core::wire::{STALENESS_TIMEOUT, SWEEP_INTERVAL};
use talkie_services::{Panel, SharedRegistry};

/// Every sweep interval: close the audio link of every peer that has gone
/// silent and reflect overall connectivity on the panel. This is the only
/// code path that ever closes an audio link.
pub async fn sweep_loop(
    registry: SharedRegistry,
    panel: Arc<dyn Panel>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("liveness sweep shutting down");
                panel.set_ok(false);
                panel.set_alert(false);
                return;
            }

            _ = interval.tick() => {
                let connected = registry.sweep(STALENESS_TIMEOUT);
                panel.set_ok(connected);
                panel.set_alert(!connected);
            }
        }
    }
}
