// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame squat metrics.
//!
//! [`SquatEvaluator`] turns one person's keypoints into a knee angle and a depth
//! verdict. It holds no state between calls, so evaluating the same keypoints twice
//! gives identical results.

use std::fmt;

use crate::config::{AnalysisConfig, BodySide};
use crate::geometry::calculate_angle;
use crate::keypoint::{KeypointSet, ScoreSet, is_valid_keypoint};

/// Feedback when hip, knee or ankle fails validation.
pub const MISSING_KEYPOINTS_FEEDBACK: &str = "Missing essential keypoints (hip, knee, ankle)";
/// Feedback for a frame that was fully analysed.
pub const ANALYSIS_COMPLETE_FEEDBACK: &str = "Analysis Complete";
/// Depth text when the knee angle is below the depth threshold.
pub const GOOD_DEPTH: &str = "Good Depth (Below Parallel)";
/// Depth text when the knee angle is at or above the depth threshold.
pub const NEEDS_IMPROVEMENT: &str = "Needs Improvement (Above Parallel)";
/// Placeholder for any value that could not be computed.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder valgus text. Valgus needs a front view and is never measured.
pub const VALGUS_PLACEHOLDER: &str = "N/A (Requires Front View)";

/// Depth classification for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFeedback {
    /// Knee angle below the depth threshold.
    BelowParallel,
    /// Knee angle at or above the depth threshold.
    AboveParallel,
    /// No knee angle could be computed.
    Undetermined,
}

impl DepthFeedback {
    /// Classify a knee angle against the depth threshold.
    #[must_use]
    pub fn classify(knee_angle: Option<f64>, threshold: f64) -> Self {
        match knee_angle {
            Some(angle) if angle < threshold => Self::BelowParallel,
            Some(_) => Self::AboveParallel,
            None => Self::Undetermined,
        }
    }

    /// Display text for reports and overlays.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BelowParallel => GOOD_DEPTH,
            Self::AboveParallel => NEEDS_IMPROVEMENT,
            Self::Undetermined => NOT_AVAILABLE,
        }
    }
}

impl fmt::Display for DepthFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knee valgus feedback. Only the front-view placeholder exists.
///
/// Callers must not treat this as a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValgusFeedback {
    #[default]
    RequiresFrontView,
}

impl ValgusFeedback {
    /// Display text for reports and overlays.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiresFrontView => VALGUS_PLACEHOLDER,
        }
    }
}

impl fmt::Display for ValgusFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one person in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SquatAnalysis {
    /// Hip, knee or ankle failed validation; no angle or depth fields exist.
    MissingKeypoints,
    /// All three keypoints were valid. The angle may still be undefined when the
    /// points are degenerate, in which case depth is [`DepthFeedback::Undetermined`].
    Complete {
        knee_angle: Option<f64>,
        depth: DepthFeedback,
    },
}

impl SquatAnalysis {
    /// Knee angle in degrees, if one was computed.
    #[must_use]
    pub const fn knee_angle(&self) -> Option<f64> {
        match self {
            Self::Complete { knee_angle, .. } => *knee_angle,
            Self::MissingKeypoints => None,
        }
    }

    /// Depth classification, absent when keypoints were missing.
    #[must_use]
    pub const fn depth(&self) -> Option<DepthFeedback> {
        match self {
            Self::Complete { depth, .. } => Some(*depth),
            Self::MissingKeypoints => None,
        }
    }

    /// Valgus placeholder, absent when keypoints were missing.
    #[must_use]
    pub const fn valgus(&self) -> Option<ValgusFeedback> {
        match self {
            Self::Complete { .. } => Some(ValgusFeedback::RequiresFrontView),
            Self::MissingKeypoints => None,
        }
    }

    /// Overall feedback string.
    #[must_use]
    pub const fn feedback(&self) -> &'static str {
        match self {
            Self::Complete { .. } => ANALYSIS_COMPLETE_FEEDBACK,
            Self::MissingKeypoints => MISSING_KEYPOINTS_FEEDBACK,
        }
    }

    /// Whether hip, knee and ankle all passed validation.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Computes knee angle and depth for a single detected person.
#[derive(Debug, Clone)]
pub struct SquatEvaluator {
    confidence_threshold: f32,
    depth_angle_threshold: f64,
    side: BodySide,
}

impl SquatEvaluator {
    /// Create an evaluator from the analysis configuration.
    #[must_use]
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            depth_angle_threshold: config.depth_angle_threshold,
            side: config.side,
        }
    }

    /// The leg this evaluator measures.
    #[must_use]
    pub const fn side(&self) -> BodySide {
        self.side
    }

    /// Evaluate one person's keypoints.
    ///
    /// # Arguments
    ///
    /// * `keypoints` - The person's 17 keypoints in frame pixel space.
    /// * `scores` - Matching confidence scores.
    ///
    /// # Returns
    ///
    /// * [`SquatAnalysis::MissingKeypoints`] if hip, knee or ankle is unusable.
    /// * [`SquatAnalysis::Complete`] otherwise.
    #[must_use]
    pub fn evaluate(&self, keypoints: &KeypointSet, scores: &ScoreSet) -> SquatAnalysis {
        let [hip_idx, knee_idx, ankle_idx] = self.side.leg();
        let (hip, knee, ankle) = (keypoints[hip_idx], keypoints[knee_idx], keypoints[ankle_idx]);

        let all_valid = [(hip, hip_idx), (knee, knee_idx), (ankle, ankle_idx)]
            .into_iter()
            .all(|(kp, idx)| is_valid_keypoint(kp, scores[idx], self.confidence_threshold));
        if !all_valid {
            return SquatAnalysis::MissingKeypoints;
        }

        let knee_angle = calculate_angle(hip, knee, ankle);
        SquatAnalysis::Complete {
            knee_angle,
            depth: DepthFeedback::classify(knee_angle, self.depth_angle_threshold),
        }
    }
}

impl Default for SquatEvaluator {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}
