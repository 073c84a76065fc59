//! Frame containers.
//!
//! - `ColorFrame`: pixels as delivered by a capture source, in some `ChannelLayout`.
//! - `FrameBuffer`: single-channel luminance grid that the classifiers diff.
//!
//! Both are plain owned buffers. A `FrameBuffer` moves from the preprocessor to
//! the frame processor, where it becomes the "previous" frame for the next cycle.
//! Pixel access goes through stride-aware row slices, so every read is bounds-checked.

use crate::error::{CurtainError, Result};

// ----------------------------------------------------------------------------
// ColorFrame: capture-side pixels
// ----------------------------------------------------------------------------

/// Byte layout of a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelLayout {
    Rgb24,
    Bgr24,
    Rgba32,
    Bgra32,
    /// Packed 4:2:2 (Y0 U Y1 V). Luma is carried directly.
    Yuyv,
}

impl ChannelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ChannelLayout::Rgb24 | ChannelLayout::Bgr24 => 3,
            ChannelLayout::Rgba32 | ChannelLayout::Bgra32 => 4,
            ChannelLayout::Yuyv => 2,
        }
    }

    /// Map a raw channel count (RGB order assumed) to a layout.
    pub fn from_channel_count(channels: usize) -> Result<Self> {
        match channels {
            3 => Ok(ChannelLayout::Rgb24),
            4 => Ok(ChannelLayout::Rgba32),
            other => Err(CurtainError::frame(format!(
                "unsupported channel count {}",
                other
            ))),
        }
    }

    /// Map a V4L2 fourcc to a layout.
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(ChannelLayout::Rgb24),
            b"BGR3" => Some(ChannelLayout::Bgr24),
            b"AB24" | b"RGBA" => Some(ChannelLayout::Rgba32),
            b"AR24" | b"BGRA" | b"RGB4" => Some(ChannelLayout::Bgra32),
            b"YUYV" => Some(ChannelLayout::Yuyv),
            _ => None,
        }
    }
}

/// A captured color frame.
///
/// Sources hand these to the frame processor, which converts them to luminance
/// and drops them. Nothing downstream keeps a reference.
#[derive(Debug)]
pub struct ColorFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including any padding.
    pub stride: usize,
    pub layout: ChannelLayout,
}

impl ColorFrame {
    /// Tightly packed frame (stride = width × bytes per pixel).
    pub fn new(data: Vec<u8>, width: u32, height: u32, layout: ChannelLayout) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * layout.bytes_per_pixel(),
            layout,
        }
    }

    /// Override the row stride for sources that pad rows.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }
}

// ----------------------------------------------------------------------------
// FrameBuffer: luminance grid
// ----------------------------------------------------------------------------

/// Grayscale luminance grid, one byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    stride: usize,
    luma: Vec<u8>,
}

impl FrameBuffer {
    /// Wrap an existing luminance buffer.
    pub fn new(width: u32, height: u32, stride: usize, luma: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CurtainError::frame(format!(
                "frame has zero dimension ({}x{})",
                width, height
            )));
        }
        if stride < width as usize {
            return Err(CurtainError::frame(format!(
                "stride {} shorter than width {}",
                stride, width
            )));
        }
        let required = stride * (height as usize - 1) + width as usize;
        if luma.len() < required {
            return Err(CurtainError::frame(format!(
                "luma buffer too short: expected at least {}, got {}",
                required,
                luma.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            luma,
        })
    }

    /// Uniform buffer, mostly useful as a baseline in tests and calibration.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            stride: width as usize,
            luma: vec![value; width as usize * height as usize],
        }
    }

    /// Build a tightly packed buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u8) -> Self {
        let mut luma = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                luma.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            stride: width as usize,
            luma,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Visible pixels of row `y` (padding excluded).
    ///
    /// Panics if `y >= height`, like slice indexing.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.luma[start..start + self.width as usize]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let width = self.width as usize;
        &mut self.luma[start..start + width]
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.row(y as usize)[x as usize])
    }

    pub fn same_dimensions(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
