//! V4L2 frame source.
//!
//! This module provides `V4l2Catalog` and `V4l2Source` for local capture
//! devices (`/dev/video*`).
//!
//! The V4L2 source is responsible for:
//! - Enumerating device nodes in index order
//! - Negotiating a packed format the preprocessor understands (RGB3 preferred)
//! - Capturing frames in-memory via mmap buffers
//!
//! The V4L2 source MUST NOT:
//! - Store captured frames to disk
//! - Retain frames beyond handoff to the frame processor

use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::{DeviceCatalog, DeviceInfo, FrameSource};
use crate::config::CaptureSettings;
use crate::error::{CurtainError, Result};
use crate::frame::{ChannelLayout, ColorFrame};

const MMAP_BUFFERS: u32 = 4;

// ----------------------------------------------------------------------------
// Catalog
// ----------------------------------------------------------------------------

/// Enumerates `/dev/video*` nodes through libv4l.
#[derive(Clone, Copy, Debug, Default)]
pub struct V4l2Catalog;

impl V4l2Catalog {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceCatalog for V4l2Catalog {
    fn devices(&self) -> Vec<DeviceInfo> {
        let mut nodes = v4l::context::enum_devices();
        nodes.sort_by_key(|node| node.index());
        nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| {
                let id = node.path().display().to_string();
                DeviceInfo {
                    index,
                    name: node.name().unwrap_or_else(|| id.clone()),
                    id,
                }
            })
            .collect()
    }

    fn open(
        &self,
        device: &DeviceInfo,
        settings: &CaptureSettings,
    ) -> Result<Box<dyn FrameSource>> {
        let mut source = V4l2Source::new(&device.id, settings.clone());
        source.connect()?;
        Ok(Box::new(source))
    }
}

// ----------------------------------------------------------------------------
// Source
// ----------------------------------------------------------------------------

/// Capture stream on one V4L2 device.
pub struct V4l2Source {
    path: String,
    settings: CaptureSettings,
    state: Option<V4l2State>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_stride: usize,
    layout: ChannelLayout,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(path: &str, settings: CaptureSettings) -> Self {
        Self {
            path: path.to_string(),
            active_width: settings.width,
            active_height: settings.height,
            active_stride: 0,
            layout: ChannelLayout::Rgb24,
            settings,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.path)
            .map_err(|e| CurtainError::device(format!("open v4l2 device {}: {}", self.path, e)))?;
        let mut format = device
            .format()
            .map_err(|e| CurtainError::device(format!("read v4l2 format: {}", e)))?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.path,
                    err
                );
                device.format().map_err(|e| {
                    CurtainError::device(format!("read v4l2 format after set failure: {}", e))
                })?
            }
        };

        let layout = ChannelLayout::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            CurtainError::device(format!(
                "{} only offers unsupported pixel format {}",
                self.path, format.fourcc
            ))
        })?;

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", self.path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_stride = format.stride as usize;
        self.layout = layout;
        self.last_error = None;

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, MMAP_BUFFERS)
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            CurtainError::device(format!("create v4l2 buffer stream: {}", err))
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.path,
            self.active_width,
            self.active_height,
            self.layout
        );
        Ok(())
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.settings.target_fps == 0 {
            2_000
        } else {
            (1000 / self.settings.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn next_frame(&mut self) -> Result<ColorFrame> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CurtainError::device("v4l2 device not connected"))?;
        let data = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                CurtainError::TransientIo(err)
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        let frame = ColorFrame::new(data, self.active_width, self.active_height, self.layout);
        if self.active_stride > 0 {
            Ok(frame.with_stride(self.active_stride))
        } else {
            Ok(frame)
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
