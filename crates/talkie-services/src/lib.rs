//! talkie-services — shared peer state, the jitter buffer, and the seams to
//! the intercom's external collaborators (audio devices, panel, directory).

pub mod device;
pub mod directory;
pub mod jitter;
pub mod peer;

pub use device::{CaptureDevice, DeviceError, NullPanel, Panel, PlaybackDevice};
pub use directory::{PeerDirectory, StaticDirectory, TailscaleDirectory};
pub use jitter::{jitter_buffer, FrameConsumer, FrameProducer, Pull};
pub use peer::{
    new_registry, AudioLink, BeaconHandle, PeerRegistry, RegistryStats, SharedRegistry,
};
