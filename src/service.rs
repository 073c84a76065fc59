//! Frame processing and capture lifecycle.
//!
//! `FrameProcessor` is the per-frame path: preprocess, classify against the
//! previous frame, update zone state. It admits one frame at a time; a frame
//! that arrives while another is in flight is dropped rather than queued, so
//! latency never grows behind a slow frame.
//!
//! `CurtainService` owns the capture thread that feeds the processor, and the
//! start/stop lifecycle around it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::{CaptureSettings, DetectionConfig};
use crate::detect::ZoneClassifier;
use crate::error::{CurtainError, Result};
use crate::frame::{ColorFrame, FrameBuffer};
use crate::ingest::{select_device, DeviceCatalog, DeviceInfo, FrameSource};
use crate::occupancy::SharedZoneState;
use crate::preprocess::to_luminance;
use crate::zones::ZoneLayout;

/// Back-off after a transient capture error.
const RETRY_DELAY: Duration = Duration::from_millis(100);

// ----------------------------------------------------------------------------
// FrameProcessor
// ----------------------------------------------------------------------------

/// What happened to a submitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Stored as the first previous frame; nothing to compare against yet.
    Primed,
    /// Compared against the previous frame; `events` transitions were emitted.
    Classified { events: usize },
    /// Another frame was in flight; this one was dropped.
    Busy,
    /// Rejected as malformed or mismatched; state untouched.
    Skipped,
    /// The processor is not running.
    Idle,
}

/// Frame counters since the processor was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub primed: u64,
    pub classified: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub events: u64,
}

#[derive(Default)]
struct FrameSlot {
    previous: Option<FrameBuffer>,
    layout: Option<ZoneLayout>,
}

#[derive(Default)]
struct Counters {
    primed: AtomicU64,
    classified: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    events: AtomicU64,
}

/// Single-in-flight frame pipeline.
pub struct FrameProcessor {
    detection: DetectionConfig,
    classifier: Box<dyn ZoneClassifier>,
    zones: Arc<SharedZoneState>,
    slot: Mutex<FrameSlot>,
    running: AtomicBool,
    counters: Counters,
}

impl FrameProcessor {
    /// Build a processor using the classifier selected by `detection.policy`.
    pub fn new(detection: DetectionConfig, zones: Arc<SharedZoneState>) -> Self {
        let classifier = detection.policy.classifier();
        Self::with_classifier(detection, classifier, zones)
    }

    pub fn with_classifier(
        detection: DetectionConfig,
        classifier: Box<dyn ZoneClassifier>,
        zones: Arc<SharedZoneState>,
    ) -> Self {
        Self {
            detection,
            classifier,
            zones,
            slot: Mutex::new(FrameSlot::default()),
            running: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn zones(&self) -> &Arc<SharedZoneState> {
        &self.zones
    }

    /// Accept frames from now on.
    pub fn begin(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Stop accepting frames, wait for any in-flight frame, then release the
    /// previous frame and reset zone state.
    pub fn end(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = FrameSlot::default();
        self.zones.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Process one captured frame. Never blocks on another frame.
    pub fn submit(&self, frame: ColorFrame) -> FrameOutcome {
        if !self.is_running() {
            return FrameOutcome::Idle;
        }
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::WouldBlock) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("frame dropped: processor busy");
                return FrameOutcome::Busy;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        // `end` may have run between the check above and taking the slot.
        if !self.is_running() {
            return FrameOutcome::Idle;
        }

        match self.process(&mut slot, &frame) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                log::warn!("frame skipped: {}", err);
                FrameOutcome::Skipped
            }
        }
    }

    fn process(
        &self,
        slot: &mut MutexGuard<'_, FrameSlot>,
        frame: &ColorFrame,
    ) -> Result<FrameOutcome> {
        let current = to_luminance(frame)?;

        let Some(previous) = slot.previous.take() else {
            slot.layout = Some(ZoneLayout::new(current.width()));
            slot.previous = Some(current);
            self.counters.primed.fetch_add(1, Ordering::Relaxed);
            return Ok(FrameOutcome::Primed);
        };

        let layout = match slot.layout.take() {
            Some(layout) if layout.width() == current.width() => layout,
            _ => ZoneLayout::new(current.width()),
        };

        let classified = self
            .classifier
            .classify(&current, &previous, &layout, &self.detection);
        let occupancy = match classified {
            Ok(occupancy) => occupancy,
            Err(err) => {
                // Capture size changed mid-session: start over from this frame.
                log::warn!(
                    "re-seeding after size change {}x{} -> {}x{}",
                    previous.width(),
                    previous.height(),
                    current.width(),
                    current.height()
                );
                slot.layout = Some(ZoneLayout::new(current.width()));
                slot.previous = Some(current);
                return Err(err);
            }
        };

        let events = self.zones.apply(&occupancy);
        slot.layout = Some(layout);
        slot.previous = Some(current);

        self.counters.classified.fetch_add(1, Ordering::Relaxed);
        self.counters
            .events
            .fetch_add(events as u64, Ordering::Relaxed);
        Ok(FrameOutcome::Classified { events })
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            primed: self.counters.primed.load(Ordering::Relaxed),
            classified: self.counters.classified.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            events: self.counters.events.load(Ordering::Relaxed),
        }
    }
}

// ----------------------------------------------------------------------------
// CurtainService
// ----------------------------------------------------------------------------

struct CaptureHandle {
    device: DeviceInfo,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// Camera-driven light curtain: capture thread + frame processor.
pub struct CurtainService {
    catalog: Arc<dyn DeviceCatalog>,
    device_index: usize,
    capture: CaptureSettings,
    processor: Arc<FrameProcessor>,
    handle: Option<CaptureHandle>,
}

impl CurtainService {
    pub fn new(
        catalog: Arc<dyn DeviceCatalog>,
        device_index: usize,
        capture: CaptureSettings,
        processor: Arc<FrameProcessor>,
    ) -> Self {
        Self {
            catalog,
            device_index,
            capture,
            processor,
            handle: None,
        }
    }

    /// Open the configured device and start capturing.
    ///
    /// Fails with a device error when no device matches; nothing is held in
    /// that case.
    pub fn start(&mut self) -> Result<DeviceInfo> {
        if self.handle.is_some() {
            return Err(CurtainError::device("service already running"));
        }
        let device = select_device(self.catalog.as_ref(), self.device_index)?;
        let source = self.catalog.open(&device, &self.capture)?;

        self.processor.begin();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let processor = self.processor.clone();
        let spawned = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || run_capture(source, processor, shutdown_thread));
        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                self.processor.end();
                return Err(err.into());
            }
        };

        log::info!(
            "light curtain started on device {}: {} ({}, policy {})",
            device.index,
            device.name,
            device.id,
            self.processor.classifier_name()
        );
        self.handle = Some(CaptureHandle {
            device: device.clone(),
            shutdown,
            join: Some(join),
        });
        Ok(device)
    }

    /// Stop capturing and reset state. Safe to call at any time.
    pub fn stop(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        handle.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = handle.join.take() {
            if join.join().is_err() {
                log::error!("capture thread panicked");
            }
        }
        self.processor.end();
        log::info!("light curtain stopped ({})", handle.device.id);
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.handle.as_ref().map(|handle| &handle.device)
    }

    pub fn processor(&self) -> &Arc<FrameProcessor> {
        &self.processor
    }
}

impl Drop for CurtainService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    mut source: Box<dyn FrameSource>,
    processor: Arc<FrameProcessor>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(frame) => {
                processor.submit(frame);
            }
            Err(err) if err.is_transient() => {
                log::warn!("capture error (retrying): {}", err);
                std::thread::sleep(RETRY_DELAY);
            }
            Err(err) => {
                log::warn!("capture frame skipped: {}", err);
                std::thread::sleep(RETRY_DELAY);
            }
        }
    }
    log::debug!(
        "capture loop exited after {} frames",
        source.frames_captured()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelLayout;
    use crate::occupancy::ZoneEvent;
    use crate::sink::ChannelSink;
    use std::sync::mpsc;

    fn gray(width: u32, height: u32, value: u8) -> ColorFrame {
        ColorFrame::new(
            vec![value; (width * height * 3) as usize],
            width,
            height,
            ChannelLayout::Rgb24,
        )
    }

    fn processor() -> (FrameProcessor, mpsc::Receiver<ZoneEvent>) {
        let (tx, rx) = mpsc::channel();
        let zones = SharedZoneState::new(Arc::new(ChannelSink::new(tx)));
        (FrameProcessor::new(DetectionConfig::default(), zones), rx)
    }

    #[test]
    fn idle_processor_ignores_frames() {
        let (processor, _rx) = processor();
        assert_eq!(processor.submit(gray(12, 10, 0)), FrameOutcome::Idle);
        assert_eq!(processor.stats(), ProcessorStats::default());
    }

    #[test]
    fn first_frame_only_primes() {
        let (processor, rx) = processor();
        processor.begin();
        assert_eq!(processor.submit(gray(12, 10, 0)), FrameOutcome::Primed);
        assert_eq!(
            processor.submit(gray(12, 10, 0)),
            FrameOutcome::Classified { events: 0 }
        );
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn busy_processor_drops_frames() {
        let (processor, _rx) = processor();
        processor.begin();
        let guard = processor.slot.lock().unwrap();
        assert_eq!(processor.submit(gray(12, 10, 0)), FrameOutcome::Busy);
        drop(guard);
        assert_eq!(processor.stats().dropped, 1);
        assert_eq!(processor.submit(gray(12, 10, 0)), FrameOutcome::Primed);
    }

    #[test]
    fn nothing_survives_end_with_concurrent_submitters() {
        let (processor, rx) = processor();
        let processor = Arc::new(processor);
        for cycle in 0..200u32 {
            processor.begin();
            let halt = Arc::new(AtomicBool::new(false));
            let submitters: Vec<_> = (0..3)
                .map(|id| {
                    let processor = processor.clone();
                    let halt = halt.clone();
                    std::thread::spawn(move || {
                        let mut value = 0u8;
                        while !halt.load(Ordering::SeqCst) {
                            value = value.wrapping_add(90 + id);
                            processor.submit(gray(12, 10, value));
                        }
                    })
                })
                .collect();
            std::thread::yield_now();
            processor.end();
            // Frames racing `end` must not land in the slot or move zone state.
            let after_end = rx.try_iter().count();
            halt.store(true, Ordering::SeqCst);
            for submitter in submitters {
                submitter.join().unwrap();
            }
            assert!(
                processor.slot.lock().unwrap().previous.is_none(),
                "stale frame kept after end in cycle {}",
                cycle
            );
            assert!(processor
                .zones()
                .snapshot()
                .iter()
                .all(|status| !status.is_blocked()));
            assert_eq!(rx.try_iter().count(), 0, "events after end ({} before)", after_end);
        }
    }

    #[test]
    fn malformed_frame_leaves_state_untouched() {
        let (processor, rx) = processor();
        processor.begin();
        processor.submit(gray(12, 10, 0));
        let broken = ColorFrame::new(vec![0; 5], 12, 10, ChannelLayout::Rgb24);
        assert_eq!(processor.submit(broken), FrameOutcome::Skipped);
        // The primed frame is still the comparison baseline.
        assert_eq!(
            processor.submit(gray(12, 10, 200)),
            FrameOutcome::Classified { events: 6 }
        );
        assert_eq!(rx.try_iter().count(), 6);
        assert_eq!(processor.stats().skipped, 1);
    }

    #[test]
    fn size_change_reseeds() {
        let (processor, rx) = processor();
        processor.begin();
        processor.submit(gray(12, 10, 0));
        assert_eq!(processor.submit(gray(24, 10, 200)), FrameOutcome::Skipped);
        assert_eq!(
            processor.submit(gray(24, 10, 200)),
            FrameOutcome::Classified { events: 0 }
        );
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn end_clears_previous_frame_and_zones() {
        let (processor, rx) = processor();
        processor.begin();
        processor.submit(gray(12, 10, 0));
        processor.submit(gray(12, 10, 200));
        assert_eq!(rx.try_iter().count(), 6);

        processor.end();
        assert!(!processor.is_running());
        assert!(processor
            .zones()
            .snapshot()
            .iter()
            .all(|status| !status.is_blocked()));

        processor.begin();
        assert_eq!(processor.submit(gray(12, 10, 200)), FrameOutcome::Primed);
    }
}
