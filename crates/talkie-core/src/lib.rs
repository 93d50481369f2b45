//! talkie-core — configuration and wire format shared by all intercom crates.

pub mod config;
pub mod wire;
