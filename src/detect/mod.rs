//! Zone classification policies.
//!
//! Two policies are kept side by side because they were tuned independently:
//! - `column-majority`: per-column noise filter, then a majority vote over the zone's columns.
//! - `pixel-ratio`: share of changed pixels in the zone against a fixed 1.5% cutoff.
//!
//! Their thresholds are not interchangeable; pick one per deployment.

mod backends;
mod classifier;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::CurtainError;

pub use backends::{ColumnVoteClassifier, PixelRatioClassifier, OCCUPIED_MOTION_PERCENT};
pub use classifier::ZoneClassifier;

/// Configuration-time choice of classifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierPolicy {
    #[default]
    ColumnMajority,
    PixelRatio,
}

impl ClassifierPolicy {
    pub fn classifier(self) -> Box<dyn ZoneClassifier> {
        match self {
            ClassifierPolicy::ColumnMajority => Box::new(ColumnVoteClassifier::new()),
            ClassifierPolicy::PixelRatio => Box::new(PixelRatioClassifier::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClassifierPolicy::ColumnMajority => "column-majority",
            ClassifierPolicy::PixelRatio => "pixel-ratio",
        }
    }
}

impl fmt::Display for ClassifierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierPolicy {
    type Err = CurtainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "column-majority" | "column" => Ok(ClassifierPolicy::ColumnMajority),
            "pixel-ratio" | "pixel" => Ok(ClassifierPolicy::PixelRatio),
            other => Err(CurtainError::config(format!(
                "unknown classifier policy '{}' (expected column-majority or pixel-ratio)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::frame::FrameBuffer;
    use crate::zones::ZoneLayout;

    const POLICIES: [ClassifierPolicy; 2] =
        [ClassifierPolicy::ColumnMajority, ClassifierPolicy::PixelRatio];

    #[test]
    fn policy_names_round_trip() {
        for policy in POLICIES {
            assert_eq!(policy.as_str().parse::<ClassifierPolicy>().unwrap(), policy);
            assert_eq!(policy.classifier().name(), policy.as_str());
        }
        assert!("median".parse::<ClassifierPolicy>().is_err());
    }

    #[test]
    fn identical_frames_are_never_occupied() {
        let frame = FrameBuffer::from_fn(97, 41, |x, y| ((x * 7 + y * 13) % 256) as u8);
        let layout = ZoneLayout::new(97);
        for policy in POLICIES {
            let classifier = policy.classifier();
            for threshold in [0u8, 1, 20, 254] {
                for deadzone in [0.0, 15.0, 50.0, 99.0, 100.0] {
                    let config = DetectionConfig {
                        motion_threshold: threshold,
                        deadzone_percent: deadzone,
                        policy,
                        ..DetectionConfig::default()
                    };
                    let occ = classifier
                        .classify(&frame, &frame, &layout, &config)
                        .unwrap();
                    assert!(!occ.any(), "{} t={} d={}", policy, threshold, deadzone);
                }
            }
        }
    }

    #[test]
    fn motion_inside_deadzone_never_occupies() {
        let previous = FrameBuffer::filled(120, 100, 0);
        for deadzone in [15.0, 30.0, 60.0] {
            let config = DetectionConfig {
                deadzone_percent: deadzone,
                ..DetectionConfig::default()
            };
            let active = config.active_height(100) as u32;
            let current = FrameBuffer::from_fn(120, 100, |_, y| if y >= active { 255 } else { 0 });
            for policy in POLICIES {
                let occ = policy
                    .classifier()
                    .classify(&current, &previous, &ZoneLayout::new(120), &config)
                    .unwrap();
                assert!(!occ.any(), "{} deadzone {}", policy, deadzone);
            }
        }
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let a = FrameBuffer::filled(120, 100, 0);
        let b = FrameBuffer::filled(120, 90, 0);
        let config = DetectionConfig::default();
        for policy in POLICIES {
            let err = policy
                .classifier()
                .classify(&a, &b, &ZoneLayout::new(120), &config)
                .unwrap_err();
            assert!(matches!(err, CurtainError::Frame(_)));

            let err = policy
                .classifier()
                .classify(&a, &a, &ZoneLayout::new(60), &config)
                .unwrap_err();
            assert!(matches!(err, CurtainError::Frame(_)));
        }
    }
}
