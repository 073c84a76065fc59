use crate::config::DetectionConfig;
use crate::error::{CurtainError, Result};
use crate::frame::FrameBuffer;
use crate::zones::{ZoneLayout, ZoneOccupancy};

/// Zone classifier trait.
///
/// Implementations compare two luminance frames of identical dimensions and
/// decide, per zone, whether the motion between them counts as occupancy.
/// They are pure: no state is kept between calls and nothing is logged.
pub trait ZoneClassifier: Send + Sync {
    /// Policy identifier.
    fn name(&self) -> &'static str;

    /// Classify one frame pair.
    ///
    /// Returns `CurtainError::Frame` when the buffers disagree in size; the
    /// caller skips the pair.
    fn classify(
        &self,
        current: &FrameBuffer,
        previous: &FrameBuffer,
        layout: &ZoneLayout,
        config: &DetectionConfig,
    ) -> Result<ZoneOccupancy>;
}

/// Shared precondition of every policy.
pub(crate) fn ensure_comparable(
    current: &FrameBuffer,
    previous: &FrameBuffer,
    layout: &ZoneLayout,
) -> Result<()> {
    if !current.same_dimensions(previous) {
        return Err(CurtainError::frame(format!(
            "dimension mismatch: current {}x{}, previous {}x{}",
            current.width(),
            current.height(),
            previous.width(),
            previous.height()
        )));
    }
    if layout.width() != current.width() {
        return Err(CurtainError::frame(format!(
            "zone layout built for width {}, frame is {}",
            layout.width(),
            current.width()
        )));
    }
    Ok(())
}

/// True when the luminance change at one pixel exceeds the motion threshold.
#[inline]
pub(crate) fn is_motion(current: u8, previous: u8, threshold: u8) -> bool {
    current.abs_diff(previous) > threshold
}
