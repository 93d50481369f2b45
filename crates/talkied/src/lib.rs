//! talkied — push-to-talk intercom daemon for a private overlay network.
//!
//! The daemon is a set of cooperating tasks around one shared peer
//! registry: discovery finds peers and starts beacons, the heartbeat
//! listener opens audio links, the sweep closes them when peers go
//! silent, the uplink fans captured audio out while the talk button is
//! held, and the downlink paces received audio into the speaker through a
//! jitter buffer.

pub mod discovery;
pub mod downlink;
pub mod heartbeat;
pub mod node;
pub mod uplink;

#[cfg(feature = "audio")]
pub mod audio;

#[cfg(feature = "gpio")]
pub mod panel;
