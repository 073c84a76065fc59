//! Synthetic frame source (`stub://` devices).
//!
//! Renders a gray background with low-amplitude sensor noise and a flickering
//! "hand" that dwells over each zone in turn, followed by one idle period with
//! no hand at all. The flicker makes the hand register as motion on every
//! frame it is present, like a real hand that never holds perfectly still.

use rand::Rng;
use std::time::{Duration, Instant};

use super::{DeviceCatalog, DeviceInfo, FrameSource};
use crate::config::CaptureSettings;
use crate::error::{CurtainError, Result};
use crate::frame::{ChannelLayout, ColorFrame};
use crate::zones::{ZoneLayout, ZONE_COUNT};

const BACKGROUND: u8 = 100;
const HAND_BRIGHT: u8 = 220;
const HAND_DARK: u8 = 60;
const DEFAULT_DWELL_FRAMES: u64 = 15;
const DEFAULT_NOISE: u8 = 3;
/// The hand covers the top 60% of the frame, well clear of the default deadzone.
const HAND_HEIGHT_PERCENT: u32 = 60;

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

/// Catalog of synthetic devices.
#[derive(Clone, Debug)]
pub struct SyntheticCatalog {
    names: Vec<String>,
    paced: bool,
}

impl SyntheticCatalog {
    /// A single device, `stub://camera`.
    pub fn new() -> Self {
        Self::with_devices(["camera"])
    }

    pub fn with_devices<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            paced: false,
        }
    }

    /// Sleep between frames to honour `CaptureSettings::target_fps`, like a real camera.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

impl Default for SyntheticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCatalog for SyntheticCatalog {
    fn devices(&self) -> Vec<DeviceInfo> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| DeviceInfo {
                index,
                id: format!("stub://{}", name),
                name: format!("Synthetic {}", name),
            })
            .collect()
    }

    fn open(
        &self,
        device: &DeviceInfo,
        settings: &CaptureSettings,
    ) -> Result<Box<dyn FrameSource>> {
        if !device.id.starts_with("stub://") {
            return Err(CurtainError::device(format!(
                "{} is not a synthetic device",
                device.id
            )));
        }
        let mut source = SyntheticSource::new(settings.width, settings.height)?;
        if self.paced {
            source = source.with_pacing(settings.target_fps);
        }
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            device.id,
            settings.width,
            settings.height
        );
        Ok(Box::new(source))
    }
}

// ----------------------------------------------------------------------------
// Source
// ----------------------------------------------------------------------------

/// Scripted RGB frame generator.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    layout: ZoneLayout,
    frame_count: u64,
    dwell_frames: u64,
    noise: u8,
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CurtainError::device(format!(
                "synthetic frame size {}x{} is empty",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            layout: ZoneLayout::new(width),
            frame_count: 0,
            dwell_frames: DEFAULT_DWELL_FRAMES,
            noise: DEFAULT_NOISE,
            frame_interval: None,
            last_frame_at: None,
        })
    }

    /// Frames the hand spends on each zone (minimum 1).
    pub fn with_dwell(mut self, frames: u64) -> Self {
        self.dwell_frames = frames.max(1);
        self
    }

    /// Peak per-pixel noise added to the background.
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn with_pacing(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs(1) / fps);
        self
    }

    /// Zone the hand covers in frame `frame_index` (0-based), if any.
    pub fn hand_zone(&self, frame_index: u64) -> Option<usize> {
        let slot = (frame_index / self.dwell_frames) % (ZONE_COUNT as u64 + 1);
        let slot = slot as usize;
        (slot < ZONE_COUNT).then_some(slot)
    }

    fn render(&self, frame_index: u64) -> Vec<u8> {
        let width = self.width as usize;
        let hand_rows = (self.height * HAND_HEIGHT_PERCENT / 100) as usize;
        let hand_columns = self.hand_zone(frame_index).map(|zone| self.layout.columns(zone));
        let mut rng = rand::thread_rng();

        let mut pixels = Vec::with_capacity(width * self.height as usize * 3);
        for y in 0..self.height as usize {
            for x in 0..width {
                let in_hand = y < hand_rows
                    && hand_columns
                        .as_ref()
                        .is_some_and(|columns| columns.contains(&x));
                let value = if in_hand {
                    if (x / 4 + y / 4 + frame_index as usize) % 2 == 0 {
                        HAND_BRIGHT
                    } else {
                        HAND_DARK
                    }
                } else if self.noise > 0 {
                    let jitter = rng.gen_range(-(self.noise as i16)..=self.noise as i16);
                    (BACKGROUND as i16 + jitter).clamp(0, 255) as u8
                } else {
                    BACKGROUND
                };
                pixels.extend_from_slice(&[value, value, value]);
            }
        }
        pixels
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<ColorFrame> {
        self.pace();
        let pixels = self.render(self.frame_count);
        self.frame_count += 1;
        Ok(ColorFrame::new(
            pixels,
            self.width,
            self.height,
            ChannelLayout::Rgb24,
        ))
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
