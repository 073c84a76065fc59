//! IR light-curtain emulator.
//!
//! A camera watches a plane that is split into six vertical zones. Each
//! captured frame is converted to luminance and differenced against the
//! previous one, and a classifier decides which zones contain motion. An
//! edge-triggered state machine turns that per-frame occupancy into
//! `blocked`/`unblocked` events that look like a row of IR beam-break sensors.
//!
//! # Module Structure
//!
//! - `frame`: color and luminance frame buffers
//! - `preprocess`: color to luminance conversion
//! - `zones`: six-zone column layout and per-frame occupancy
//! - `detect`: zone classifiers (column-majority, pixel-ratio)
//! - `occupancy`: edge-triggered zone state shared across event sources
//! - `sink`: event delivery (log, channel, UDP forward, fan-out)
//! - `service`: single-in-flight frame processor and capture lifecycle
//! - `ingest`: capture devices (synthetic, V4L2)
//! - `external`: UDP JSON zone input
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod external;
pub mod frame;
pub mod ingest;
pub mod occupancy;
pub mod preprocess;
pub mod service;
pub mod sink;
pub mod zones;

pub use config::{CaptureSettings, CurtainConfig, DetectionConfig, ExternalSettings};
pub use detect::{ClassifierPolicy, ZoneClassifier};
pub use error::{CurtainError, ErrorKind};
pub use external::{ExternalInputListener, ZoneCommand};
pub use frame::{ChannelLayout, ColorFrame, FrameBuffer};
pub use ingest::{DeviceCatalog, DeviceInfo, FrameSource, SyntheticCatalog, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use ingest::{V4l2Catalog, V4l2Source};
pub use occupancy::{SharedZoneState, ZoneEvent, ZoneStateMachine, ZoneStatus};
pub use service::{CurtainService, FrameOutcome, FrameProcessor, ProcessorStats};
pub use sink::{ChannelSink, DatagramSink, EventSink, FanoutSink, LogSink};
pub use zones::{ZoneLayout, ZoneOccupancy, ZONE_COUNT};
