//! Talkie wire format — well-known ports, protocol timing, and the PCM
//! frame codec.
//!
//! The audio payload is deliberately headerless: one datagram carries
//! exactly one frame of little-endian signed 16-bit PCM samples, nothing
//! else. No sequence numbers, no sender identity — the overlay transport
//! provides addressing, and loss is masked by the jitter buffer. Heartbeat
//! payloads are never interpreted; any receipt counts as liveness.

use std::time::Duration;

use bytes::{Bytes, BytesMut};

/// UDP port on which audio frames are received.
pub const AUDIO_PORT: u16 = 7416;

/// UDP port on which liveness beacons are received.
pub const HEARTBEAT_PORT: u16 = 7417;

/// Canonical beacon payload. Receivers do not inspect it.
pub const BEACON_PAYLOAD: [u8; 1] = [1];

/// How often each outbound beacon task sends a liveness datagram.
pub const BEACON_INTERVAL: Duration = Duration::from_secs(1);

/// Silence longer than this closes a peer's audio link at the next sweep.
/// Twice the beacon interval: one lost datagram does not flap the link.
pub const STALENESS_TIMEOUT: Duration = Duration::from_secs(2);

/// How often the liveness sweep scans the registry.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(2);

/// How often the discovery loop queries the peer directory.
pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

/// How often the talk gate is sampled from the panel button.
pub const GATE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Jitter buffer capacity in frames — about 100ms of audio at the default
/// frame size.
pub const JITTER_CAPACITY: usize = 5;

/// How long the playback loop waits for a frame before substituting
/// silence.
pub const PLAYBACK_PULL_TIMEOUT: Duration = Duration::from_millis(50);

/// Default capture/playback sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default samples per frame (mono).
pub const FRAME_SAMPLES: usize = 512;

/// One frame of mono PCM audio.
pub type Frame = Vec<i16>;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("datagram is {got} bytes, expected {expected} for a {samples}-sample frame")]
    BadLength {
        got: usize,
        expected: usize,
        samples: usize,
    },
}

/// On-wire size of a frame of `samples` samples.
pub fn frame_wire_len(samples: usize) -> usize {
    samples * 2
}

/// Encode a frame to its wire form: each sample as two little-endian bytes.
pub fn encode_frame(frame: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(frame.len() * 2);
    for &sample in frame {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    buf.freeze()
}

/// Decode a datagram into a frame of exactly `samples` samples.
///
/// Anything of the wrong length is rejected rather than padded or
/// truncated — a short or oversized datagram is not audio we sent.
pub fn decode_frame(buf: &[u8], samples: usize) -> Result<Frame, WireError> {
    let expected = frame_wire_len(samples);
    if buf.len() != expected {
        return Err(WireError::BadLength {
            got: buf.len(),
            expected,
            samples,
        });
    }
    Ok(buf
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
