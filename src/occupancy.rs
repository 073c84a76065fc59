//! Edge-triggered zone state.
//!
//! Classifier output is level-based and noisy from frame to frame. The state
//! machine keeps the last *emitted* status per zone and only produces a
//! `ZoneEvent` when the new level differs from it, so a hand held in a zone
//! yields one `blocked` event rather than one per frame.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::sink::EventSink;
use crate::zones::{ZoneOccupancy, ZONE_COUNT};

/// A zone changed state. Only created on a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ZoneEvent {
    pub zone: usize,
    pub blocked: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZoneStatus {
    #[default]
    Unblocked,
    Blocked,
}

impl ZoneStatus {
    pub fn is_blocked(self) -> bool {
        self == ZoneStatus::Blocked
    }

    fn from_blocked(blocked: bool) -> Self {
        if blocked {
            ZoneStatus::Blocked
        } else {
            ZoneStatus::Unblocked
        }
    }
}

/// Per-zone status with edge-triggered updates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneStateMachine {
    state: [ZoneStatus; ZONE_COUNT],
}

impl ZoneStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, zone: usize) -> ZoneStatus {
        self.state[zone]
    }

    pub fn snapshot(&self) -> [ZoneStatus; ZONE_COUNT] {
        self.state
    }

    /// Move `zone` to `blocked`; returns the event if this is a transition.
    ///
    /// Out-of-range zones are ignored.
    pub fn update(&mut self, zone: usize, blocked: bool) -> Option<ZoneEvent> {
        let slot = self.state.get_mut(zone)?;
        let next = ZoneStatus::from_blocked(blocked);
        if *slot == next {
            return None;
        }
        *slot = next;
        Some(ZoneEvent { zone, blocked })
    }

    /// Apply a frame's occupancy, delivering each transition to `sink` in zone order.
    ///
    /// Returns the number of events emitted.
    pub fn apply(&mut self, occupancy: &ZoneOccupancy, sink: &dyn EventSink) -> usize {
        let mut emitted = 0;
        for (zone, occupied) in occupancy.iter() {
            if let Some(event) = self.update(zone, occupied) {
                sink.on_zone_event(event);
                emitted += 1;
            }
        }
        emitted
    }

    /// Back to all-unblocked, without emitting anything.
    pub fn reset(&mut self) {
        self.state = [ZoneStatus::Unblocked; ZONE_COUNT];
    }
}

/// Zone state shared by every event source feeding one sink.
///
/// The camera path and the external datagram path both go through here, so
/// they agree on what has already been reported downstream.
pub struct SharedZoneState {
    machine: Mutex<ZoneStateMachine>,
    sink: Arc<dyn EventSink>,
}

impl SharedZoneState {
    pub fn new(sink: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            machine: Mutex::new(ZoneStateMachine::new()),
            sink,
        })
    }

    pub fn apply(&self, occupancy: &ZoneOccupancy) -> usize {
        self.lock().apply(occupancy, self.sink.as_ref())
    }

    /// Set a single zone; returns true when an event was emitted.
    pub fn set_zone(&self, zone: usize, blocked: bool) -> bool {
        let mut machine = self.lock();
        match machine.update(zone, blocked) {
            Some(event) => {
                self.sink.on_zone_event(event);
                true
            }
            None => false,
        }
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn snapshot(&self) -> [ZoneStatus; ZONE_COUNT] {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, ZoneStateMachine> {
        // A panicking sink leaves the state itself consistent.
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::sink::ChannelSink;

    fn occupied(zones: &[usize]) -> ZoneOccupancy {
        let mut occ = ZoneOccupancy::new();
        for &zone in zones {
            occ.set(zone, true);
        }
        occ
    }

    #[test]
    fn repeated_occupancy_emits_once() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        let mut machine = ZoneStateMachine::new();

        for _ in 0..10 {
            machine.apply(&occupied(&[2]), &sink);
        }
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![ZoneEvent {
                zone: 2,
                blocked: true
            }]
        );
        assert!(machine.status(2).is_blocked());
    }

    #[test]
    fn release_emits_unblock_once() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        let mut machine = ZoneStateMachine::new();

        machine.apply(&occupied(&[0, 5]), &sink);
        machine.apply(&occupied(&[5]), &sink);
        machine.apply(&occupied(&[5]), &sink);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ZoneEvent {
                    zone: 0,
                    blocked: true
                },
                ZoneEvent {
                    zone: 5,
                    blocked: true
                },
                ZoneEvent {
                    zone: 0,
                    blocked: false
                },
            ]
        );
    }

    #[test]
    fn unblocking_an_idle_zone_is_silent() {
        let mut machine = ZoneStateMachine::new();
        assert_eq!(machine.update(1, false), None);
        assert_eq!(machine.update(9, true), None);
    }

    #[test]
    fn reset_is_silent_and_total() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        let mut machine = ZoneStateMachine::new();
        machine.apply(&occupied(&[0, 1, 2, 3, 4, 5]), &sink);
        assert_eq!(rx.try_iter().count(), 6);

        machine.reset();
        assert_eq!(rx.try_iter().count(), 0);
        assert_eq!(machine, ZoneStateMachine::new());
    }

    #[test]
    fn shared_state_deduplicates_across_sources() {
        let (tx, rx) = mpsc::channel();
        let shared = SharedZoneState::new(Arc::new(ChannelSink::new(tx)));

        assert!(shared.set_zone(3, true));
        // A camera frame reporting the same zone adds nothing.
        assert_eq!(shared.apply(&occupied(&[3])), 0);
        assert!(!shared.set_zone(3, true));
        assert!(shared.set_zone(3, false));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(shared.snapshot(), [ZoneStatus::Unblocked; ZONE_COUNT]);
    }
}
