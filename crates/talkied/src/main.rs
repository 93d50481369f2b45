//! talkied — push-to-talk intercom daemon.

use std::sync::Arc;

use anyhow::Result;

use talkie_core::config::TalkieConfig;
use talkie_services::{CaptureDevice, NullPanel, Panel, PeerDirectory, PlaybackDevice, TailscaleDirectory};

use talkied::node::{self, NodeDevices};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = TalkieConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = TalkieConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        TalkieConfig::default()
    });

    tracing::info!(
        heartbeat_port = config.network.heartbeat_port,
        audio_port = config.network.audio_port,
        sample_rate = config.audio.sample_rate,
        frame_samples = config.audio.frame_samples,
        "talkied starting"
    );

    let directory: Arc<dyn PeerDirectory> = Arc::new(TailscaleDirectory::new());
    match directory.local_addr() {
        Some(addr) => tracing::info!(%addr, "local overlay address"),
        None => tracing::warn!("could not determine local overlay address"),
    }

    let panel = build_panel(&config);
    let (capture, playback) = build_audio(&config);

    let node = node::spawn(
        &config,
        NodeDevices {
            capture,
            playback,
            panel,
            directory,
        },
    )
    .await?;

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received");
    node.shutdown().await;

    Ok(())
}

#[cfg(feature = "gpio")]
fn build_panel(config: &TalkieConfig) -> Arc<dyn Panel> {
    if !config.panel.gpio {
        tracing::info!("gpio disabled in config, running without indicators");
        return Arc::new(NullPanel);
    }
    match talkied::panel::GpioPanel::open(&config.panel) {
        Ok(panel) => Arc::new(panel),
        Err(e) => {
            tracing::warn!(error = %e, "panel hardware unavailable, running without indicators");
            Arc::new(NullPanel)
        }
    }
}

#[cfg(not(feature = "gpio"))]
fn build_panel(_config: &TalkieConfig) -> Arc<dyn Panel> {
    tracing::info!("built without the gpio feature, running without indicators");
    Arc::new(NullPanel)
}

#[cfg(feature = "audio")]
fn build_audio(
    config: &TalkieConfig,
) -> (Option<Box<dyn CaptureDevice>>, Option<Box<dyn PlaybackDevice>>) {
    let capture = match talkied::audio::CpalCapture::open(
        config.audio.sample_rate,
        config.audio.frame_samples,
    ) {
        Ok(capture) => Some(Box::new(capture) as Box<dyn CaptureDevice>),
        Err(e) => {
            tracing::warn!(error = %e, "capture device unavailable, transmit disabled");
            None
        }
    };
    let playback = match talkied::audio::CpalPlayback::open(
        config.audio.sample_rate,
        config.audio.frame_samples,
    ) {
        Ok(playback) => Some(Box::new(playback) as Box<dyn PlaybackDevice>),
        Err(e) => {
            tracing::warn!(error = %e, "playback device unavailable, receive disabled");
            None
        }
    };
    (capture, playback)
}

#[cfg(not(feature = "audio"))]
fn build_audio(
    _config: &TalkieConfig,
) -> (Option<Box<dyn CaptureDevice>>, Option<Box<dyn PlaybackDevice>>) {
    tracing::warn!("built without the audio feature, running silent");
    (None, None)
}
