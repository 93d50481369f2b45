//! Downlink receiver and playback — buffers inbound audio and paces it
//! into the playback device, substituting silence on underrun.
//!
//! One receiver serves every sender: the protocol does not distinguish
//! talkers on the playback path, so simultaneous speakers interleave.
//! The receiver never blocks on the buffer (a frame arriving while it is
//! full is dropped) and the playback loop never waits more than the pull
//! timeout before writing something, so the device cadence is kept even
//! through loss and jitter.

use anyhow::Result;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use talkie_core::wire::{self, JITTER_CAPACITY, PLAYBACK_PULL_TIMEOUT};
use talkie_services::{jitter_buffer, FrameConsumer, PlaybackDevice, Pull};

/// Receive audio datagrams, pre-fill the jitter buffer, then run playback
/// until shutdown. Dropping the producer on exit is what stops the
/// playback thread.
pub async fn downlink_loop(
    socket: UdpSocket,
    playback: Box<dyn PlaybackDevice>,
    frame_samples: usize,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let (producer, consumer) = jitter_buffer(JITTER_CAPACITY);
    // One byte of slack so an oversized datagram fails the length check
    // instead of being silently truncated by recv.
    let mut buf = vec![0u8; wire::frame_wire_len(frame_samples) + 1];

    tracing::info!(addr = %socket.local_addr()?, "audio receiver starting");

    // Build initial slack against arrival jitter before playback starts.
    let mut primed = 0;
    while primed < JITTER_CAPACITY - 1 {
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),

            received = socket.recv_from(&mut buf) => {
                if let Some(frame) = frame_from(received, &buf, frame_samples) {
                    producer.offer(frame);
                    primed += 1;
                }
            }
        }
    }
    tracing::info!(frames = primed, "jitter buffer primed, starting playback");

    let playback_task =
        tokio::task::spawn_blocking(move || playback_loop(playback, consumer, frame_samples));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("audio receiver shutting down");
                break;
            }

            received = socket.recv_from(&mut buf) => {
                if let Some(frame) = frame_from(received, &buf, frame_samples) {
                    if !producer.offer(frame) {
                        tracing::trace!("jitter buffer full, dropping frame");
                    }
                }
            }
        }
    }

    drop(producer);
    let _ = playback_task.await;
    Ok(())
}

fn frame_from(
    received: std::io::Result<(usize, std::net::SocketAddr)>,
    buf: &[u8],
    frame_samples: usize,
) -> Option<wire::Frame> {
    match received {
        Ok((len, _)) => match wire::decode_frame(&buf[..len], frame_samples) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::debug!(error = %e, "discarding malformed audio datagram");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "audio recv failed");
            None
        }
    }
}

/// One device write per cycle: the next buffered frame, or silence when
/// none arrives within the pull timeout. Runs until the producer is gone.
fn playback_loop(
    mut playback: Box<dyn PlaybackDevice>,
    consumer: FrameConsumer,
    frame_samples: usize,
) {
    let silence = vec![0i16; frame_samples];

    tracing::info!("playback starting");
    loop {
        let frame = match consumer.pull(PLAYBACK_PULL_TIMEOUT) {
            Pull::Frame(frame) => frame,
            Pull::Silence => silence.clone(),
            Pull::Closed => {
                tracing::info!("playback shutting down");
                return;
            }
        };
        if let Err(e) = playback.write_frame(&frame) {
            tracing::warn!(error = %e, "playback write failed");
        }
    }
}
