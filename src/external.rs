//! External zone input over UDP.
//!
//! Another process (e.g. a hand-tracking server) can drive zones directly by
//! sending datagrams like `{"zone": 0, "state": "blocked"}`. Matching is
//! deliberately permissive: any UTF-8 text containing a `"zone"` integer and a
//! `"state"` of `blocked`/`unblocked` (any case) is accepted. Everything else
//! is dropped without a reply.
//!
//! Accepted messages go through the same `SharedZoneState` as the camera, so a
//! zone already reported blocked is not reported again.

use regex::Regex;
use serde::Serialize;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{CurtainError, Result};
use crate::occupancy::{SharedZoneState, ZoneEvent};
use crate::zones::ZONE_COUNT;

const MAX_DATAGRAM_BYTES: usize = 2048;
const POLL_INTERVAL: Duration = Duration::from_millis(200);
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// A parsed zone command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneCommand {
    pub zone: usize,
    pub blocked: bool,
}

fn zone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""zone"\s*:\s*(\d+)"#).expect("zone pattern"))
}

fn state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)"state"\s*:\s*"(blocked|unblocked)""#).expect("state pattern")
    })
}

/// Parse one datagram. Returns `None` for anything malformed or out of range.
pub fn parse_message(payload: &[u8]) -> Option<ZoneCommand> {
    let text = std::str::from_utf8(payload).ok()?;
    let zone: usize = zone_pattern().captures(text)?.get(1)?.as_str().parse().ok()?;
    if zone >= ZONE_COUNT {
        return None;
    }
    let state = state_pattern().captures(text)?.get(1)?.as_str();
    Some(ZoneCommand {
        zone,
        blocked: state.eq_ignore_ascii_case("blocked"),
    })
}

#[derive(Serialize)]
struct ZoneMessage {
    zone: usize,
    state: &'static str,
}

/// Render an event in the wire format accepted by `parse_message`.
pub fn format_message(event: ZoneEvent) -> String {
    let message = ZoneMessage {
        zone: event.zone,
        state: if event.blocked { "blocked" } else { "unblocked" },
    };
    // Serializing a struct of an integer and a static string cannot fail.
    serde_json::to_string(&message).unwrap_or_default()
}

// ----------------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------------

struct ListenerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// UDP listener feeding a `SharedZoneState`.
pub struct ExternalInputListener {
    zones: Arc<SharedZoneState>,
    handle: Option<ListenerHandle>,
}

impl ExternalInputListener {
    pub fn new(zones: Arc<SharedZoneState>) -> Self {
        Self {
            zones,
            handle: None,
        }
    }

    /// Bind `bind_addr` and start the receive thread.
    pub fn start(&mut self, bind_addr: &str) -> Result<SocketAddr> {
        if self.handle.is_some() {
            return Err(CurtainError::device("external input listener already running"));
        }
        let socket = UdpSocket::bind(bind_addr).map_err(|e| {
            CurtainError::device(format!("bind external input on {}: {}", bind_addr, e))
        })?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let addr = socket.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let zones = self.zones.clone();
        let join = std::thread::Builder::new()
            .name("external-input".to_string())
            .spawn(move || listen_loop(socket, zones, shutdown_thread))?;

        log::info!("external input listener started on udp {}", addr);
        self.handle = Some(ListenerHandle {
            addr,
            shutdown,
            join: Some(join),
        });
        Ok(addr)
    }

    /// Stop the receive thread. Safe to call when not running.
    pub fn stop(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        handle.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = handle.join.take() {
            if join.join().is_err() {
                log::error!("external input thread panicked");
            }
        }
        log::info!("external input listener stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.as_ref().map(|handle| handle.addr)
    }
}

impl Drop for ExternalInputListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(socket: UdpSocket, zones: Arc<SharedZoneState>, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM_BYTES];
    while !shutdown.load(Ordering::SeqCst) {
        match socket.recv_from(&mut buf) {
            Ok((len, peer)) => match parse_message(&buf[..len]) {
                Some(command) => {
                    zones.set_zone(command.zone, command.blocked);
                }
                None => log::debug!("ignored external input from {}", peer),
            },
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(err) => {
                log::warn!("external input receive error: {}", err);
                std::thread::sleep(RETRY_DELAY);
            }
        }
    }
}
