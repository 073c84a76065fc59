//! Frame acquisition.
//!
//! Capture devices sit behind two traits:
//! - `DeviceCatalog`: enumerates devices and opens one by `DeviceInfo`.
//! - `FrameSource`: yields `ColorFrame`s from an opened device.
//!
//! Provided implementations:
//! - Synthetic `stub://` devices (testing, demos)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Sources hand each frame over by value and keep no reference to it. Frames
//! are never written to disk.

pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use synthetic::{SyntheticCatalog, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Catalog, V4l2Source};

use crate::config::CaptureSettings;
use crate::error::{CurtainError, Result};
use crate::frame::ColorFrame;

/// An enumerated capture device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the catalog listing; what the config's `device_index` selects.
    pub index: usize,
    /// Stable identifier, e.g. a device path or a `stub://` URL.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

/// A running capture stream.
pub trait FrameSource: Send {
    /// Block until the next frame is available.
    ///
    /// `CurtainError::TransientIo` means "try again shortly"; other errors skip
    /// the frame.
    fn next_frame(&mut self) -> Result<ColorFrame>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn frames_captured(&self) -> u64;
}

/// Enumerates and opens capture devices.
pub trait DeviceCatalog: Send + Sync {
    fn devices(&self) -> Vec<DeviceInfo>;

    fn open(&self, device: &DeviceInfo, settings: &CaptureSettings)
        -> Result<Box<dyn FrameSource>>;
}

/// Pick the device at `index` from the catalog listing.
pub fn select_device(catalog: &dyn DeviceCatalog, index: usize) -> Result<DeviceInfo> {
    let devices = catalog.devices();
    if devices.is_empty() {
        return Err(CurtainError::NoDevices);
    }
    let available = devices.len();
    devices
        .into_iter()
        .nth(index)
        .ok_or(CurtainError::DeviceIndex { index, available })
}
