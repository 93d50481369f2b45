//! Configuration system for Talkie.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TALKIE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/talkie/config.toml
//!   3. ~/.config/talkie/config.toml

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::wire;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TalkieConfig {
    pub network: NetworkConfig,
    pub audio: AudioConfig,
    pub panel: PanelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address the listening sockets bind to. Unspecified = all
    /// interfaces; pin to the node's overlay address to keep the intercom
    /// off other networks.
    pub bind_addr: IpAddr,
    /// UDP port for liveness beacons. Must match across all peers.
    pub heartbeat_port: u16,
    /// UDP port for audio frames. Must match across all peers.
    pub audio_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture/playback sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame (mono). All peers must agree — the wire format
    /// carries no frame-size header.
    pub frame_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Drive LEDs and read the talk button over GPIO. Disable on nodes
    /// without the hardware.
    pub gpio: bool,
    /// BCM pin for the "connected" LED.
    pub ok_pin: u8,
    /// BCM pin for the "no peers" LED.
    pub alert_pin: u8,
    /// BCM pin for the push-to-talk button (pull-up, active low).
    pub button_pin: u8,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TalkieConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            audio: AudioConfig::default(),
            panel: PanelConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            heartbeat_port: wire::HEARTBEAT_PORT,
            audio_port: wire::AUDIO_PORT,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: wire::SAMPLE_RATE,
            frame_samples: wire::FRAME_SAMPLES,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            gpio: true,
            ok_pin: 12,
            alert_pin: 22,
            button_pin: 5,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("talkie")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TalkieConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TalkieConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TALKIE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TalkieConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TALKIE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TALKIE_NETWORK__BIND_ADDR") {
            if let Ok(addr) = v.parse() {
                self.network.bind_addr = addr;
            }
        }
        if let Ok(v) = std::env::var("TALKIE_NETWORK__HEARTBEAT_PORT") {
            if let Ok(p) = v.parse() {
                self.network.heartbeat_port = p;
            }
        }
        if let Ok(v) = std::env::var("TALKIE_NETWORK__AUDIO_PORT") {
            if let Ok(p) = v.parse() {
                self.network.audio_port = p;
            }
        }
        if let Ok(v) = std::env::var("TALKIE_AUDIO__SAMPLE_RATE") {
            if let Ok(r) = v.parse() {
                self.audio.sample_rate = r;
            }
        }
        if let Ok(v) = std::env::var("TALKIE_AUDIO__FRAME_SAMPLES") {
            if let Ok(n) = v.parse() {
                self.audio.frame_samples = n;
            }
        }
        if let Ok(v) = std::env::var("TALKIE_PANEL__GPIO") {
            self.panel.gpio = v == "true" || v == "1";
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_wire_constants() {
        let config = TalkieConfig::default();
        assert_eq!(config.network.heartbeat_port, wire::HEARTBEAT_PORT);
        assert_eq!(config.network.audio_port, wire::AUDIO_PORT);
        assert_eq!(config.audio.frame_samples, wire::FRAME_SAMPLES);
        assert!(config.network.bind_addr.is_unspecified());
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = TalkieConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: TalkieConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.network.heartbeat_port, config.network.heartbeat_port);
        assert_eq!(back.panel.button_pin, config.panel.button_pin);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: TalkieConfig = toml::from_str("[network]\nheartbeat_port = 9000\n").unwrap();
        assert_eq!(config.network.heartbeat_port, 9000);
        assert_eq!(config.network.audio_port, wire::AUDIO_PORT);
        assert_eq!(config.audio.sample_rate, wire::SAMPLE_RATE);
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("talkie-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        std::env::set_var("TALKIE_CONFIG", config_path.to_str().unwrap());

        let path = TalkieConfig::write_default_if_missing().expect("write_default_if_missing failed");
        assert!(path.exists());

        let config = TalkieConfig::load().expect("load should succeed");
        assert_eq!(config.network.heartbeat_port, wire::HEARTBEAT_PORT);

        std::env::remove_var("TALKIE_CONFIG");
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
