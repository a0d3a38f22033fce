// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Analysis thresholds and body side selection.
//!
//! [`AnalysisConfig`] is built once and handed to each component at construction.
//! Nothing reads thresholds from global state.

use std::fmt;
use std::str::FromStr;

use crate::error::{AnalysisError, Result};
use crate::keypoint::KeypointIndex;

/// Which leg the knee angle is measured on.
///
/// The side is a fixed choice for a whole run; there is no per-frame selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodySide {
    Left,
    #[default]
    Right,
}

impl BodySide {
    /// Hip, knee and ankle indices for this side.
    #[must_use]
    pub const fn leg(self) -> [KeypointIndex; 3] {
        match self {
            Self::Left => [
                KeypointIndex::LeftHip,
                KeypointIndex::LeftKnee,
                KeypointIndex::LeftAnkle,
            ],
            Self::Right => [
                KeypointIndex::RightHip,
                KeypointIndex::RightKnee,
                KeypointIndex::RightAnkle,
            ],
        }
    }
}

impl fmt::Display for BodySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

impl FromStr for BodySide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(format!("Unknown body side: {s} (expected 'left' or 'right')")),
        }
    }
}

/// Configuration for squat analysis.
///
/// # Example
///
/// ```rust
/// use squat_form::AnalysisConfig;
///
/// let config = AnalysisConfig::new()
///     .with_confidence(0.5)
///     .with_depth_threshold(90.0)
///     .with_smoothing_window(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Minimum keypoint confidence; a score must strictly exceed it.
    pub confidence_threshold: f32,
    /// Knee angle (degrees) below which depth counts as below parallel.
    pub depth_angle_threshold: f64,
    /// Smoothed knee angle (degrees) below which a standing lifter enters the squat.
    pub squat_entry_threshold: f64,
    /// Smoothed knee angle (degrees) above which a squatting lifter is standing again.
    pub rise_threshold: f64,
    /// Number of recent angles averaged before the rep counter sees them.
    pub smoothing_window: usize,
    /// Leg used for the knee angle.
    pub side: BodySide,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            depth_angle_threshold: 95.0,
            squat_entry_threshold: 110.0,
            rise_threshold: 160.0,
            smoothing_window: 5,
            side: BodySide::Right,
        }
    }
}

impl AnalysisConfig {
    /// Create a configuration with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keypoint confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the depth angle threshold in degrees.
    #[must_use]
    pub const fn with_depth_threshold(mut self, degrees: f64) -> Self {
        self.depth_angle_threshold = degrees;
        self
    }

    /// Set the angle that starts a squat in degrees.
    #[must_use]
    pub const fn with_squat_threshold(mut self, degrees: f64) -> Self {
        self.squat_entry_threshold = degrees;
        self
    }

    /// Set the angle that completes a rep in degrees.
    #[must_use]
    pub const fn with_rise_threshold(mut self, degrees: f64) -> Self {
        self.rise_threshold = degrees;
        self
    }

    /// Set the smoothing window length.
    #[must_use]
    pub const fn with_smoothing_window(mut self, window: usize) -> Self {
        self.smoothing_window = window;
        self
    }

    /// Set the measured leg.
    #[must_use]
    pub const fn with_side(mut self, side: BodySide) -> Self {
        self.side = side;
        self
    }

    /// Check that the thresholds describe a usable analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::ConfigError`] if the confidence is outside `[0, 1]`,
    /// an angle is outside `(0, 180]`, the entry threshold is not below the rise
    /// threshold, or the smoothing window is zero.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::ConfigError(format!(
                "confidence threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }

        for (name, value) in [
            ("depth threshold", self.depth_angle_threshold),
            ("squat threshold", self.squat_entry_threshold),
            ("rise threshold", self.rise_threshold),
        ] {
            if !(value > 0.0 && value <= 180.0) {
                return Err(AnalysisError::ConfigError(format!(
                    "{name} must be in (0, 180] degrees, got {value}"
                )));
            }
        }

        if self.squat_entry_threshold >= self.rise_threshold {
            return Err(AnalysisError::ConfigError(format!(
                "squat threshold ({}) must be below rise threshold ({})",
                self.squat_entry_threshold, self.rise_threshold
            )));
        }

        if self.smoothing_window == 0 {
            return Err(AnalysisError::ConfigError(
                "smoothing window must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
