//! Peer registry — the single source of truth for who is known, who is
//! live, and where audio goes.
//!
//! One readers-writer lock guards the whole table. Every operation takes
//! the lock for the duration of a single logical step and never holds it
//! across blocking I/O; the only syscalls made under the lock are the
//! non-blocking UDP `bind`/`connect` pair when an audio link is dialed.
//!
//! Entries are never removed once created. Peer loss is expressed as "no
//! audio link", not as roster deletion — the liveness sweep clears the
//! link and leaves the rest of the record alone.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Outbound audio transport to one peer — a connected UDP socket.
///
/// Cheap to clone; the last clone dropped closes the socket.
#[derive(Debug, Clone)]
pub struct AudioLink {
    socket: Arc<UdpSocket>,
}

impl AudioLink {
    /// Dial the peer's audio endpoint. UDP connect only fixes the
    /// destination; nothing travels until the first send.
    pub fn dial(endpoint: SocketAddr) -> std::io::Result<Self> {
        let bind: SocketAddr = match endpoint {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind)?;
        socket.connect(endpoint)?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Send one encoded frame to the peer.
    pub fn send(&self, payload: &[u8]) -> std::io::Result<usize> {
        self.socket.send(payload)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.peer_addr().ok()
    }
}

/// Abort handle for a peer's outbound beacon task.
#[derive(Debug)]
pub struct BeaconHandle {
    task: JoinHandle<()>,
}

impl BeaconHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Tracked state for one known peer.
#[derive(Debug, Default)]
struct Connection {
    /// Most recent inbound liveness signal. `None` until the peer has
    /// actually been heard from — a discovered-but-silent peer is stale.
    last_heartbeat: Option<Instant>,
    audio_link: Option<AudioLink>,
    beacon: Option<BeaconHandle>,
}

/// Counts for the periodic status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Roster entries (never shrinks).
    pub known: usize,
    /// Entries with an open audio link.
    pub linked: usize,
    /// Entries heard from within the staleness timeout.
    pub live: usize,
}

/// The peer registry — shared between the heartbeat, discovery, sweep, and
/// uplink tasks.
pub struct PeerRegistry {
    connections: RwLock<HashMap<IpAddr, Connection>>,
    audio_port: u16,
}

pub type SharedRegistry = Arc<PeerRegistry>;

/// Create a new empty peer registry. `audio_port` is the well-known port
/// peers receive audio on, used when dialing their audio endpoint.
pub fn new_registry(audio_port: u16) -> SharedRegistry {
    Arc::new(PeerRegistry::new(audio_port))
}

impl PeerRegistry {
    pub fn new(audio_port: u16) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            audio_port,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<IpAddr, Connection>> {
        self.connections.read().expect("peer table lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IpAddr, Connection>> {
        self.connections.write().expect("peer table lock poisoned")
    }

    /// A liveness datagram arrived from `addr`. Creates the roster entry on
    /// first contact, opens the audio link if it is missing, and refreshes
    /// the heartbeat timestamp. A failed dial is logged and retried on the
    /// next heartbeat.
    pub fn on_heartbeat_received(&self, addr: IpAddr) {
        let mut table = self.write();
        let conn = table.entry(addr).or_insert_with(|| {
            tracing::info!(peer = %addr, "heartbeat from new peer");
            Connection::default()
        });
        if conn.audio_link.is_none() {
            let endpoint = SocketAddr::new(addr, self.audio_port);
            match AudioLink::dial(endpoint) {
                Ok(link) => {
                    tracing::info!(peer = %addr, port = self.audio_port, "audio link established");
                    conn.audio_link = Some(link);
                }
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "audio endpoint dial failed");
                }
            }
        }
        conn.last_heartbeat = Some(Instant::now());
    }

    /// The directory reported `addr` as reachable. Creates the roster entry
    /// if unknown and starts a beacon task if none is active.
    pub fn on_discovered(&self, addr: IpAddr, start_beacon: impl FnOnce() -> BeaconHandle) {
        let mut table = self.write();
        let conn = table.entry(addr).or_insert_with(|| {
            tracing::info!(peer = %addr, "peer discovered");
            Connection::default()
        });
        let active = conn.beacon.as_ref().is_some_and(|b| !b.is_finished());
        if !active {
            conn.beacon = Some(start_beacon());
        }
    }

    /// Close the audio link of every peer not heard from within `timeout`.
    /// The roster entry and its beacon stay untouched. Returns whether at
    /// least one peer is live.
    pub fn sweep(&self, timeout: Duration) -> bool {
        let mut table = self.write();
        let mut any_live = false;
        for (addr, conn) in table.iter_mut() {
            let live = matches!(conn.last_heartbeat, Some(at) if at.elapsed() <= timeout);
            if live {
                any_live = true;
            } else if conn.audio_link.take().is_some() {
                tracing::info!(peer = %addr, "peer stale, closing audio link");
            }
        }
        any_live
    }

    /// Clone the current set of open audio links for fan-out.
    pub fn snapshot_audio_links(&self) -> Vec<AudioLink> {
        self.read()
            .values()
            .filter_map(|conn| conn.audio_link.clone())
            .collect()
    }

    pub fn stats(&self, timeout: Duration) -> RegistryStats {
        let table = self.read();
        let mut stats = RegistryStats {
            known: table.len(),
            linked: 0,
            live: 0,
        };
        for conn in table.values() {
            if conn.audio_link.is_some() {
                stats.linked += 1;
            }
            if matches!(conn.last_heartbeat, Some(at) if at.elapsed() <= timeout) {
                stats.live += 1;
            }
        }
        stats
    }

    /// Abort every stored beacon task. Shutdown path only — during normal
    /// operation beacons outlive directory churn.
    pub fn cancel_beacons(&self) {
        let mut table = self.write();
        for conn in table.values_mut() {
            if let Some(beacon) = conn.beacon.take() {
                beacon.cancel();
            }
        }
    }

    pub fn is_known(&self, addr: IpAddr) -> bool {
        self.read().contains_key(&addr)
    }

    pub fn has_audio_link(&self, addr: IpAddr) -> bool {
        self.read()
            .get(&addr)
            .is_some_and(|conn| conn.audio_link.is_some())
    }

    pub fn has_beacon(&self, addr: IpAddr) -> bool {
        self.read()
            .get(&addr)
            .is_some_and(|conn| conn.beacon.is_some())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
