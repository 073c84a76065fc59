use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::ClassifierPolicy;
use crate::error::CurtainError;

pub const DEFAULT_MOTION_THRESHOLD: u8 = 20;
pub const DEFAULT_DEADZONE_PERCENT: f64 = 15.0;
pub const DEFAULT_COLUMN_ACTIVATION_FRACTION: f64 = 0.02;
pub const DEFAULT_ZONE_ACTIVATION_FRACTION: f64 = 0.5;
pub const DEFAULT_EXTERNAL_PORT: u16 = 24865;
const DEFAULT_DEVICE_INDEX: usize = 0;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_CAPTURE_WIDTH: u32 = 640;
const DEFAULT_CAPTURE_HEIGHT: u32 = 480;

// ----------------------------------------------------------------------------
// Detection settings
// ----------------------------------------------------------------------------

/// Motion detection tuning. Fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionConfig {
    /// Luminance change a pixel must exceed to count as motion.
    pub motion_threshold: u8,
    /// Bottom share of the frame (percent of height) that is never analysed.
    pub deadzone_percent: f64,
    /// Share of analysed rows that must move before a column is active (column-majority only).
    pub column_activation_fraction: f64,
    /// Share of a zone's columns that must be active (column-majority only).
    pub zone_activation_fraction: f64,
    pub policy: ClassifierPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            deadzone_percent: DEFAULT_DEADZONE_PERCENT,
            column_activation_fraction: DEFAULT_COLUMN_ACTIVATION_FRACTION,
            zone_activation_fraction: DEFAULT_ZONE_ACTIVATION_FRACTION,
            policy: ClassifierPolicy::default(),
        }
    }
}

impl DetectionConfig {
    /// Rows `[0, active_height)` are analysed; the rest is deadzone.
    pub fn active_height(&self, height: u32) -> usize {
        let height = height as usize;
        let deadzone = (height as f64 * self.deadzone_percent / 100.0).floor();
        let deadzone = if deadzone > 0.0 { deadzone as usize } else { 0 };
        height.saturating_sub(deadzone)
    }

    /// Minimum number of moving rows for a column to count as active.
    pub fn per_column_threshold(&self, active_height: usize) -> usize {
        let rows = (active_height as f64 * self.column_activation_fraction).round();
        (rows as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), CurtainError> {
        if !(0.0..=100.0).contains(&self.deadzone_percent) {
            return Err(CurtainError::config(format!(
                "deadzone percent must be within 0-100, got {}",
                self.deadzone_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.column_activation_fraction) {
            return Err(CurtainError::config(format!(
                "column activation fraction must be within 0-1, got {}",
                self.column_activation_fraction
            )));
        }
        if !(self.zone_activation_fraction > 0.0 && self.zone_activation_fraction <= 1.0) {
            return Err(CurtainError::config(format!(
                "zone activation fraction must be within (0, 1], got {}",
                self.zone_activation_fraction
            )));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Service settings
// ----------------------------------------------------------------------------

/// Capture request passed to the device when it is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ExternalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_EXTERNAL_PORT,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CurtainConfig {
    pub device_index: usize,
    pub capture: CaptureSettings,
    pub detection: DetectionConfig,
    pub external: ExternalSettings,
    /// Optional UDP address that receives every zone event as a JSON datagram.
    pub forward_addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CurtainConfigFile {
    device_index: Option<usize>,
    capture: Option<CaptureConfigFile>,
    detection: Option<DetectionConfigFile>,
    external: Option<ExternalConfigFile>,
    forward_addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    motion_threshold: Option<u8>,
    deadzone_percent: Option<f64>,
    column_activation_fraction: Option<f64>,
    zone_activation_fraction: Option<f64>,
    policy: Option<ClassifierPolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct ExternalConfigFile {
    enabled: Option<bool>,
    port: Option<u16>,
}

impl CurtainConfig {
    /// Load from `CURTAIN_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CURTAIN_CONFIG").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load from an explicit file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => CurtainConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CurtainConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let external = file.external.unwrap_or_default();
        Self {
            device_index: file.device_index.unwrap_or(DEFAULT_DEVICE_INDEX),
            capture: CaptureSettings {
                target_fps: capture.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                width: capture.width.unwrap_or(DEFAULT_CAPTURE_WIDTH),
                height: capture.height.unwrap_or(DEFAULT_CAPTURE_HEIGHT),
            },
            detection: DetectionConfig {
                motion_threshold: detection
                    .motion_threshold
                    .unwrap_or(DEFAULT_MOTION_THRESHOLD),
                deadzone_percent: detection
                    .deadzone_percent
                    .unwrap_or(DEFAULT_DEADZONE_PERCENT),
                column_activation_fraction: detection
                    .column_activation_fraction
                    .unwrap_or(DEFAULT_COLUMN_ACTIVATION_FRACTION),
                zone_activation_fraction: detection
                    .zone_activation_fraction
                    .unwrap_or(DEFAULT_ZONE_ACTIVATION_FRACTION),
                policy: detection.policy.unwrap_or_default(),
            },
            external: ExternalSettings {
                enabled: external.enabled.unwrap_or(true),
                port: external.port.unwrap_or(DEFAULT_EXTERNAL_PORT),
            },
            forward_addr: file.forward_addr.filter(|addr| !addr.trim().is_empty()),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(index) = env_value("CURTAIN_DEVICE_INDEX") {
            self.device_index = index
                .parse()
                .map_err(|_| anyhow!("CURTAIN_DEVICE_INDEX must be a non-negative integer"))?;
        }
        if let Some(threshold) = env_value("CURTAIN_MOTION_THRESHOLD") {
            self.detection.motion_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("CURTAIN_MOTION_THRESHOLD must be an integer in 0-255"))?;
        }
        if let Some(deadzone) = env_value("CURTAIN_DEADZONE_PERCENT") {
            self.detection.deadzone_percent = deadzone
                .parse()
                .map_err(|_| anyhow!("CURTAIN_DEADZONE_PERCENT must be a number"))?;
        }
        if let Some(policy) = env_value("CURTAIN_POLICY") {
            self.detection.policy = policy.parse()?;
        }
        if let Some(port) = env_value("CURTAIN_EXTERNAL_PORT") {
            self.external.port = port
                .parse()
                .map_err(|_| anyhow!("CURTAIN_EXTERNAL_PORT must be a port number"))?;
        }
        if let Some(addr) = env_value("CURTAIN_FORWARD_ADDR") {
            self.forward_addr = Some(addr);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(anyhow!("capture width and height must be greater than zero"));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<CurtainConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
