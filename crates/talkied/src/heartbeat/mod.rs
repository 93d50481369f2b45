//! Heartbeat protocol — outbound beacons, the inbound listener, and the
//! liveness sweep.
//!
//! One beacon task per beaconed peer sends a datagram every second; the
//! single listener treats any datagram on the heartbeat port as proof of
//! life; the sweep closes audio links for peers silent longer than the
//! staleness timeout. Period 1s against timeout 2s tolerates one dropped
//! datagram without flapping a link.

mod beacon;
mod listener;
mod sweep;

pub use beacon::{beacon_loop, start_beacon};
pub use listener::listener_loop;
pub use sweep::sweep_loop;
