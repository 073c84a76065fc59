use crate::config::DetectionConfig;
use crate::detect::classifier::{ensure_comparable, is_motion, ZoneClassifier};
use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::zones::{ZoneLayout, ZoneOccupancy};

/// Share of a zone's analysed pixels (in percent) that must change.
/// Fixed for this policy; `zone_activation_fraction` does not apply.
pub const OCCUPIED_MOTION_PERCENT: f64 = 1.5;

/// Raw pixel percentage.
///
/// Counts changed pixels over the whole zone area, without any per-column filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct PixelRatioClassifier;

impl PixelRatioClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ZoneClassifier for PixelRatioClassifier {
    fn name(&self) -> &'static str {
        "pixel-ratio"
    }

    fn classify(
        &self,
        current: &FrameBuffer,
        previous: &FrameBuffer,
        layout: &ZoneLayout,
        config: &DetectionConfig,
    ) -> Result<ZoneOccupancy> {
        ensure_comparable(current, previous, layout)?;

        let active_height = config.active_height(current.height());
        let threshold = config.motion_threshold;

        let mut occupancy = ZoneOccupancy::new();
        for (zone, columns) in layout.iter() {
            let area = columns.len() * active_height;
            if area == 0 {
                continue;
            }
            let mut motion_pixels = 0usize;
            for y in 0..active_height {
                let cur = &current.row(y)[columns.clone()];
                let prev = &previous.row(y)[columns.clone()];
                motion_pixels += cur
                    .iter()
                    .zip(prev)
                    .filter(|&(&c, &p)| is_motion(c, p, threshold))
                    .count();
            }
            let motion_percent = motion_pixels as f64 / area as f64 * 100.0;
            occupancy.set(zone, motion_percent > OCCUPIED_MOTION_PERCENT);
        }
        Ok(occupancy)
    }
}
