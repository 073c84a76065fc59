//! Event sinks.
//!
//! The hardware protocol layer sits behind `EventSink`. Sinks are called
//! synchronously on the processing path and must return quickly: log, hand the
//! event to a channel, or fire a datagram.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::{mpsc, Arc};

use crate::error::{CurtainError, Result};
use crate::external::format_message;
use crate::occupancy::ZoneEvent;

pub trait EventSink: Send + Sync {
    fn on_zone_event(&self, event: ZoneEvent);
}

impl<F> EventSink for F
where
    F: Fn(ZoneEvent) + Send + Sync,
{
    fn on_zone_event(&self, event: ZoneEvent) {
        self(event)
    }
}

/// Logs `IR <zone> BLOCKED|UNBLOCKED` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_zone_event(&self, event: ZoneEvent) {
        log::info!(
            "IR {} {}",
            event.zone,
            if event.blocked { "BLOCKED" } else { "UNBLOCKED" }
        );
    }
}

/// Hands events to an unbounded channel; a dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::Sender<ZoneEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ZoneEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn on_zone_event(&self, event: ZoneEvent) {
        let _ = self.tx.send(event);
    }
}

/// Forwards each event as a JSON datagram (`{"zone":n,"state":"blocked"}`).
///
/// Send failures are logged and dropped.
pub struct DatagramSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl DatagramSink {
    pub fn connect(target: &str) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| CurtainError::config(format!("forward address '{}': {}", target, e)))?
            .next()
            .ok_or_else(|| {
                CurtainError::config(format!("forward address '{}' did not resolve", target))
            })?;
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).map_err(|e| {
            CurtainError::device(format!("bind forward socket for {}: {}", target, e))
        })?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl EventSink for DatagramSink {
    fn on_zone_event(&self, event: ZoneEvent) {
        let message = format_message(event);
        if let Err(err) = self.socket.send_to(message.as_bytes(), self.target) {
            log::warn!("zone event forward to {} failed: {}", self.target, err);
        }
    }
}

/// Delivers each event to every inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn on_zone_event(&self, event: ZoneEvent) {
        for sink in &self.sinks {
            sink.on_zone_event(event);
        }
    }
}
