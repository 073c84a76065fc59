use crate::config::DetectionConfig;
use crate::detect::classifier::{ensure_comparable, is_motion, ZoneClassifier};
use crate::error::Result;
use crate::frame::FrameBuffer;
use crate::zones::{ZoneLayout, ZoneOccupancy};

/// Column majority vote.
///
/// A column is active when enough of its analysed rows changed; a zone is
/// occupied when the active share of its columns reaches
/// `zone_activation_fraction`. Requiring a majority of columns keeps a hand
/// straddling a boundary from lighting up both neighbours.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColumnVoteClassifier;

impl ColumnVoteClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ZoneClassifier for ColumnVoteClassifier {
    fn name(&self) -> &'static str {
        "column-majority"
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

        let mut column_motion = vec![0usize; current.width() as usize];
        for y in 0..active_height {
            let rows = current.row(y).iter().zip(previous.row(y));
            for (count, (&cur, &prev)) in column_motion.iter_mut().zip(rows) {
                if is_motion(cur, prev, threshold) {
                    *count += 1;
                }
            }
        }

        let per_column = config.per_column_threshold(active_height);
        let required_percent = config.zone_activation_fraction * 100.0;

        let mut occupancy = ZoneOccupancy::new();
        for (zone, columns) in layout.iter() {
            let zone_columns = columns.len();
            if zone_columns == 0 {
                continue;
            }
            let active = column_motion[columns]
                .iter()
                .filter(|&&count| count >= per_column)
                .count();
            let active_percent = active as f64 / zone_columns as f64 * 100.0;
            occupancy.set(zone, active_percent >= required_percent);
        }
        Ok(occupancy)
    }
}
