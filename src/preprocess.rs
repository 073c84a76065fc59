//! Color to luminance conversion.

use crate::error::{CurtainError, Result};
use crate::frame::{ChannelLayout, ColorFrame, FrameBuffer};

// Fixed-point 0.30 / 0.59 / 0.11 perceptual weights, scaled by 256.
// The weights sum to 256, so white stays 255.
const LUMA_R: u32 = 77;
const LUMA_G: u32 = 151;
const LUMA_B: u32 = 28;

/// Convert a captured frame into a luminance `FrameBuffer` of identical dimensions.
///
/// The input is only borrowed for the duration of the call.
pub fn to_luminance(frame: &ColorFrame) -> Result<FrameBuffer> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 {
        return Err(CurtainError::frame(format!(
            "frame has zero dimension ({}x{})",
            frame.width, frame.height
        )));
    }

    let bpp = frame.layout.bytes_per_pixel();
    let row_bytes = width
        .checked_mul(bpp)
        .ok_or_else(|| CurtainError::frame("frame dimensions overflow"))?;
    if frame.stride < row_bytes {
        return Err(CurtainError::frame(format!(
            "stride {} shorter than row of {} bytes",
            frame.stride, row_bytes
        )));
    }
    if frame.layout == ChannelLayout::Yuyv && width % 2 != 0 {
        return Err(CurtainError::frame("YUYV frame width must be even"));
    }
    let required = frame
        .stride
        .checked_mul(height - 1)
        .and_then(|v| v.checked_add(row_bytes))
        .ok_or_else(|| CurtainError::frame("frame dimensions overflow"))?;
    let pixels = frame.pixels();
    if pixels.len() < required {
        return Err(CurtainError::frame(format!(
            "frame length mismatch: expected at least {}, got {}",
            required,
            pixels.len()
        )));
    }

    let mut luma = Vec::with_capacity(width * height);
    for y in 0..height {
        let start = y * frame.stride;
        let row = &pixels[start..start + row_bytes];
        match frame.layout {
            ChannelLayout::Rgb24 | ChannelLayout::Rgba32 => {
                luma.extend(row.chunks_exact(bpp).map(|px| weigh(px[0], px[1], px[2])));
            }
            ChannelLayout::Bgr24 | ChannelLayout::Bgra32 => {
                luma.extend(row.chunks_exact(bpp).map(|px| weigh(px[2], px[1], px[0])));
            }
            ChannelLayout::Yuyv => {
                luma.extend(row.chunks_exact(4).flat_map(|px| [px[0], px[2]]));
            }
        }
    }

    FrameBuffer::new(frame.width, frame.height, width, luma)
}

fn weigh(r: u8, g: u8, b: u8) -> u8 {
    ((LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32 + 128) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_map_to_extremes() {
        assert_eq!(weigh(0, 0, 0), 0);
        assert_eq!(weigh(255, 255, 255), 255);
    }

    #[test]
    fn weights_follow_perceptual_order() {
        let r = weigh(200, 0, 0);
        let g = weigh(0, 200, 0);
        let b = weigh(0, 0, 200);
        assert!(g > r && r > b);
        assert_eq!(r, 60);
        assert_eq!(g, 118);
        assert_eq!(b, 22);
    }

    #[test]
    fn rgb_and_bgr_agree() {
        let rgb = ColorFrame::new(vec![200, 100, 50, 10, 20, 30], 2, 1, ChannelLayout::Rgb24);
        let bgr = ColorFrame::new(vec![50, 100, 200, 30, 20, 10], 2, 1, ChannelLayout::Bgr24);
        assert_eq!(to_luminance(&rgb).unwrap(), to_luminance(&bgr).unwrap());
    }

    #[test]
    fn alpha_channel_is_ignored() {
        let rgba = ColorFrame::new(vec![90, 90, 90, 0, 90, 90, 90, 255], 2, 1, ChannelLayout::Rgba32);
        let buf = to_luminance(&rgba).unwrap();
        assert_eq!(buf.row(0), &[90, 90]);
    }

    #[test]
    fn yuyv_takes_luma_samples() {
        let yuyv = ColorFrame::new(vec![10, 128, 20, 128, 30, 128, 40, 128], 4, 1, ChannelLayout::Yuyv);
        let buf = to_luminance(&yuyv).unwrap();
        assert_eq!(buf.row(0), &[10, 20, 30, 40]);
    }

    #[test]
    fn padded_stride_is_respected() {
        // 1x2 RGB frame with 2 padding bytes per row.
        let data = vec![255, 255, 255, 7, 7, 0, 0, 0];
        let frame = ColorFrame::new(data, 1, 2, ChannelLayout::Rgb24).with_stride(5);
        let buf = to_luminance(&frame).unwrap();
        assert_eq!(buf.width(), 1);
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.row(0), &[255]);
        assert_eq!(buf.row(1), &[0]);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let empty = ColorFrame::new(vec![], 0, 4, ChannelLayout::Rgb24);
        assert!(matches!(to_luminance(&empty), Err(CurtainError::Frame(_))));

        let short = ColorFrame::new(vec![0; 10], 2, 2, ChannelLayout::Rgb24);
        assert!(matches!(to_luminance(&short), Err(CurtainError::Frame(_))));

        let narrow = ColorFrame::new(vec![0; 12], 2, 2, ChannelLayout::Rgb24).with_stride(4);
        assert!(matches!(to_luminance(&narrow), Err(CurtainError::Frame(_))));

        let odd = ColorFrame::new(vec![0; 6], 3, 1, ChannelLayout::Yuyv);
        assert!(matches!(to_luminance(&odd), Err(CurtainError::Frame(_))));
    }
}
