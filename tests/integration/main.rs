//! Talkie integration test harness.
//!
//! Spins up full in-process nodes on distinct loopback addresses
//! (127.0.0.1, 127.0.0.2, …) and drives them with scripted devices — no
//! sound hardware, no GPIO, no mesh CLI. Both nodes share the same
//! "well-known" port pair, picked fresh per test so runs don't collide.
//!
//! Timings here follow the real protocol constants (1s beacons, 2s
//! staleness, 2s sweeps), so the liveness tests take a few wall-clock
//! seconds by design.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use talkie_core::config::TalkieConfig;
use talkie_core::wire;
use talkie_services::{CaptureDevice, DeviceError, Panel, PlaybackDevice, StaticDirectory};
use talkied::node::{self, Node, NodeDevices};

// ── Harness ───────────────────────────────────────────────────────────────────

const NODE_A: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const NODE_B: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2));

/// Frame size kept tiny so scripted capture can pace fast.
const FRAME_SAMPLES: usize = 8;

/// Pick a free (heartbeat, audio) port pair. Both nodes reuse the pair on
/// their own loopback addresses.
fn free_port_pair() -> (u16, u16) {
    let a = UdpSocket::bind("127.0.0.1:0").expect("bind probe socket");
    let b = UdpSocket::bind("127.0.0.1:0").expect("bind probe socket");
    (
        a.local_addr().unwrap().port(),
        b.local_addr().unwrap().port(),
    )
}

/// Panel double: the test flips the button, the node drives the lights.
#[derive(Default)]
struct TestPanel {
    pressed: AtomicBool,
    ok: AtomicBool,
    alert: AtomicBool,
}

impl Panel for TestPanel {
    fn set_ok(&self, on: bool) {
        self.ok.store(on, Ordering::Relaxed);
    }
    fn set_alert(&self, on: bool) {
        self.alert.store(on, Ordering::Relaxed);
    }
    fn talk_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }
}

/// Capture double: endless frames of one marker value at roughly the
/// real-time frame cadence, counting every read.
struct ToneCapture {
    marker: i16,
    reads: Arc<AtomicUsize>,
}

impl CaptureDevice for ToneCapture {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<(), DeviceError> {
        std::thread::sleep(Duration::from_millis(11));
        frame.fill(self.marker);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Playback double: records every written frame.
#[derive(Clone, Default)]
struct SinkPlayback {
    frames: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl PlaybackDevice for SinkPlayback {
    fn write_frame(&mut self, frame: &[i16]) -> Result<(), DeviceError> {
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

impl SinkPlayback {
    fn received_marker(&self, marker: i16) -> bool {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .any(|f| f.iter().all(|&s| s == marker))
    }
}

fn test_config(bind: IpAddr, heartbeat_port: u16, audio_port: u16) -> TalkieConfig {
    let mut config = TalkieConfig::default();
    config.network.bind_addr = bind;
    config.network.heartbeat_port = heartbeat_port;
    config.network.audio_port = audio_port;
    config.audio.frame_samples = FRAME_SAMPLES;
    config
}

async fn spawn_node(
    bind: IpAddr,
    ports: (u16, u16),
    peers: Vec<IpAddr>,
    capture: Option<Box<dyn CaptureDevice>>,
    playback: Option<Box<dyn PlaybackDevice>>,
    panel: Arc<TestPanel>,
) -> Node {
    let config = test_config(bind, ports.0, ports.1);
    node::spawn(
        &config,
        NodeDevices {
            capture,
            playback,
            panel,
            directory: Arc::new(StaticDirectory::new(Some(bind), peers)),
        },
    )
    .await
    .expect("node must start")
}

/// Poll `condition` until it holds or the deadline passes.
async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Discovery on both sides leads to beacons, heartbeats, and audio links
/// within about one heartbeat period; the sweep then reports connected.
#[tokio::test(flavor = "multi_thread")]
async fn nodes_discover_and_link() {
    let ports = free_port_pair();
    let panel_a = Arc::new(TestPanel::default());
    let panel_b = Arc::new(TestPanel::default());

    let a = spawn_node(NODE_A, ports, vec![NODE_B], None, None, panel_a.clone()).await;
    let b = spawn_node(NODE_B, ports, vec![NODE_A], None, None, panel_b.clone()).await;

    let linked = wait_until(Duration::from_secs(5), || {
        a.registry().has_audio_link(NODE_B) && b.registry().has_audio_link(NODE_A)
    })
    .await;
    assert!(linked, "both nodes must open audio links to each other");

    assert!(a.registry().has_beacon(NODE_B), "A must beacon B");
    assert!(b.registry().has_beacon(NODE_A), "B must beacon A");

    // The next sweep turns the ok light on and the alert light off.
    let lit = wait_until(Duration::from_secs(5), || {
        panel_a.ok.load(Ordering::Relaxed) && !panel_a.alert.load(Ordering::Relaxed)
    })
    .await;
    assert!(lit, "A's panel must show connected");

    a.shutdown().await;
    b.shutdown().await;
}

/// A peer that stops heartbeating without any goodbye loses its audio
/// link after the staleness timeout, but keeps its roster entry.
#[tokio::test(flavor = "multi_thread")]
async fn stale_peer_loses_link_but_stays_known() {
    let ports = free_port_pair();
    let panel = Arc::new(TestPanel::default());
    let a = spawn_node(NODE_A, ports, Vec::new(), None, None, panel.clone()).await;

    // Hand-rolled peer: heartbeats from 127.0.0.2, then silence forever.
    let beacon = UdpSocket::bind((NODE_B, 0)).expect("bind fake peer socket");
    let target = a.heartbeat_addr();
    for _ in 0..3 {
        beacon.send_to(&wire::BEACON_PAYLOAD, target).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let linked =
        wait_until(Duration::from_secs(2), || a.registry().has_audio_link(NODE_B)).await;
    assert!(linked, "heartbeats must open an audio link");

    // No more heartbeats: staleness timeout (2s) plus one sweep interval
    // (2s) must be enough to close the link.
    let dropped =
        wait_until(Duration::from_secs(6), || !a.registry().has_audio_link(NODE_B)).await;
    assert!(dropped, "stale peer's audio link must close");
    assert!(a.registry().is_known(NODE_B), "roster entry must survive");
    assert!(
        !panel.ok.load(Ordering::Relaxed) && panel.alert.load(Ordering::Relaxed),
        "panel must show disconnected once the only peer goes stale"
    );

    a.shutdown().await;
}

/// Holding the talk button streams captured frames to the peer's
/// playback device; releasing it stops capture within a gate poll.
#[tokio::test(flavor = "multi_thread")]
async fn talk_gate_starts_and_stops_streaming() {
    let ports = free_port_pair();
    let panel_a = Arc::new(TestPanel::default());
    let panel_b = Arc::new(TestPanel::default());
    let reads = Arc::new(AtomicUsize::new(0));
    let sink = SinkPlayback::default();

    let a = spawn_node(
        NODE_A,
        ports,
        vec![NODE_B],
        Some(Box::new(ToneCapture {
            marker: 9,
            reads: reads.clone(),
        })),
        None,
        panel_a.clone(),
    )
    .await;
    let b = spawn_node(
        NODE_B,
        ports,
        vec![NODE_A],
        None,
        Some(Box::new(sink.clone())),
        panel_b.clone(),
    )
    .await;

    let linked = wait_until(Duration::from_secs(5), || {
        a.registry().has_audio_link(NODE_B) && b.registry().has_audio_link(NODE_A)
    })
    .await;
    assert!(linked);

    // Push to talk.
    panel_a.pressed.store(true, Ordering::Relaxed);
    let heard = wait_until(Duration::from_secs(5), || sink.received_marker(9)).await;
    assert!(heard, "captured frames must reach the peer's playback device");

    // Release: capture reads must stop within a gate poll plus one
    // in-flight frame.
    panel_a.pressed.store(false, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(300)).await;
    let reads_after_release = reads.load(Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let drift = reads.load(Ordering::Relaxed) - reads_after_release;
    assert!(
        drift <= 1,
        "capture must stop after the gate opens, read {drift} more frames"
    );

    a.shutdown().await;
    b.shutdown().await;
}
