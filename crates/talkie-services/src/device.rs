//! Seams to the audio and panel hardware.
//!
//! The daemon talks to capture/playback devices and the indicator panel
//! only through these traits; concrete backends live in the daemon crate
//! behind cargo features, and tests substitute scripted implementations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),
    #[error("stream closed")]
    StreamClosed,
}

/// A source of captured audio frames.
pub trait CaptureDevice: Send {
    /// Block until `frame` is filled with captured samples.
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError>;
}

/// A sink for playback audio frames.
pub trait PlaybackDevice: Send {
    /// Block until the device accepts the frame.
    fn write_frame(&mut self, frame: &[i16]) -> Result<(), DeviceError>;
}

/// Indicator lights and the push-to-talk button.
pub trait Panel: Send + Sync {
    /// "Connected" light.
    fn set_ok(&self, on: bool);
    /// "No peers" light.
    fn set_alert(&self, on: bool);
    /// Current state of the push-to-talk button.
    fn talk_pressed(&self) -> bool;
}

/// Panel stand-in for nodes without indicator hardware. The talk gate
/// reads as released, so such a node is receive-only.
pub struct NullPanel;

impl Panel for NullPanel {
    fn set_ok(&self, _on: bool) {}
    fn set_alert(&self, _on: bool) {}
    fn talk_pressed(&self) -> bool {
        false
    }
}
