// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame metric records and the video-level summary.
//!
//! [`FrameMetrics`] serializes to the exported schema:
//! `frame_index, knee_angle, squat_depth_feedback, knee_valgus_feedback, feedback,
//! processing_time`. Fields that do not apply to a frame are written as `"N/A"`.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::squat::{DepthFeedback, NOT_AVAILABLE, SquatAnalysis, ValgusFeedback};

/// Feedback for a frame where the pose model found nobody.
pub const NO_PERSON_FEEDBACK: &str = "No person detected";
/// Feedback for a frame where the pose model call failed.
pub const INFERENCE_ERROR_FEEDBACK: &str = "Inference Error";

/// How far analysis of a frame got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    /// Hip, knee and ankle were valid and metrics were computed.
    Complete,
    /// A person was found but hip, knee or ankle was unusable.
    MissingKeypoints,
    /// The pose model returned no people.
    NoPersonDetected,
    /// The pose model failed on this frame.
    InferenceError,
}

impl FrameStatus {
    /// Feedback string written for this status.
    #[must_use]
    pub const fn feedback(self) -> &'static str {
        match self {
            Self::Complete => crate::squat::ANALYSIS_COMPLETE_FEEDBACK,
            Self::MissingKeypoints => crate::squat::MISSING_KEYPOINTS_FEEDBACK,
            Self::NoPersonDetected => NO_PERSON_FEEDBACK,
            Self::InferenceError => INFERENCE_ERROR_FEEDBACK,
        }
    }
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feedback())
    }
}

/// Immutable metrics for one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    /// Zero-based position of the frame in the source.
    pub frame_index: usize,
    /// Knee angle in degrees. Present iff the leg was valid and the angle defined.
    pub knee_angle: Option<f64>,
    /// Depth classification, present only for [`FrameStatus::Complete`].
    pub squat_depth_feedback: Option<DepthFeedback>,
    /// Valgus placeholder, present only for [`FrameStatus::Complete`].
    pub knee_valgus_feedback: Option<ValgusFeedback>,
    /// Outcome of the frame.
    pub status: FrameStatus,
    /// Wall time spent on the frame in seconds.
    pub processing_time: f64,
}

impl FrameMetrics {
    /// Build a record from an evaluation of the primary person.
    #[must_use]
    pub fn from_analysis(frame_index: usize, analysis: &SquatAnalysis, processing_time: f64) -> Self {
        let status = if analysis.is_complete() {
            FrameStatus::Complete
        } else {
            FrameStatus::MissingKeypoints
        };
        Self {
            frame_index,
            knee_angle: analysis.knee_angle(),
            squat_depth_feedback: analysis.depth(),
            knee_valgus_feedback: analysis.valgus(),
            status,
            processing_time,
        }
    }

    /// Record for a frame without any detected person.
    #[must_use]
    pub const fn no_person(frame_index: usize, processing_time: f64) -> Self {
        Self::bare(frame_index, FrameStatus::NoPersonDetected, processing_time)
    }

    /// Record for a frame where inference failed.
    #[must_use]
    pub const fn inference_error(frame_index: usize, processing_time: f64) -> Self {
        Self::bare(frame_index, FrameStatus::InferenceError, processing_time)
    }

    const fn bare(frame_index: usize, status: FrameStatus, processing_time: f64) -> Self {
        Self {
            frame_index,
            knee_angle: None,
            squat_depth_feedback: None,
            knee_valgus_feedback: None,
            status,
            processing_time,
        }
    }

    /// General feedback string for the frame.
    #[must_use]
    pub const fn feedback(&self) -> &'static str {
        self.status.feedback()
    }

    /// Depth text, `"N/A"` when absent.
    #[must_use]
    pub fn depth_text(&self) -> &'static str {
        self.squat_depth_feedback
            .map_or(NOT_AVAILABLE, DepthFeedback::as_str)
    }

    /// Valgus text, `"N/A"` when absent.
    #[must_use]
    pub fn valgus_text(&self) -> &'static str {
        self.knee_valgus_feedback
            .map_or(NOT_AVAILABLE, ValgusFeedback::as_str)
    }

    /// Knee angle with one decimal, `"N/A"` when absent.
    #[must_use]
    pub fn angle_text(&self) -> String {
        self.knee_angle
            .map_or_else(|| NOT_AVAILABLE.to_string(), |a| format!("{a:.1}"))
    }
}

/// A knee angle cell: the number, or the `"N/A"` sentinel.
#[derive(Serialize)]
#[serde(untagged)]
enum AngleCell {
    Degrees(f64),
    Missing(&'static str),
}

#[derive(Serialize)]
struct FrameRow {
    frame_index: usize,
    knee_angle: AngleCell,
    squat_depth_feedback: &'static str,
    knee_valgus_feedback: &'static str,
    feedback: &'static str,
    processing_time: f64,
}

impl Serialize for FrameMetrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        FrameRow {
            frame_index: self.frame_index,
            knee_angle: self
                .knee_angle
                .map_or(AngleCell::Missing(NOT_AVAILABLE), AngleCell::Degrees),
            squat_depth_feedback: self.depth_text(),
            knee_valgus_feedback: self.valgus_text(),
            feedback: self.feedback(),
            processing_time: self.processing_time,
        }
        .serialize(serializer)
    }
}

/// Overall depth verdict for a whole video, based on the minimum knee angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallDepth {
    Achieved,
    NeedsDeeper,
    Undetermined,
}

impl OverallDepth {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Achieved => "Achieved good depth.",
            Self::NeedsDeeper => "May need to go deeper.",
            Self::Undetermined => "Could not determine.",
        }
    }
}

impl Serialize for OverallDepth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for OverallDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video-level summary computed from all frame records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_frames: usize,
    /// Frames with a defined knee angle.
    pub frames_with_angle: usize,
    pub missing_keypoint_frames: usize,
    pub no_person_frames: usize,
    pub inference_error_frames: usize,
    /// Smallest knee angle seen, i.e. the deepest point.
    pub min_knee_angle: Option<f64>,
    /// Mean per-frame processing time in seconds.
    pub avg_processing_time: f64,
    pub overall_depth: OverallDepth,
    /// Completed reps, when rep counting was enabled.
    pub reps: Option<u32>,
}

impl AnalysisSummary {
    /// Summarise a sequence of frame records.
    #[must_use]
    pub fn from_frames(frames: &[FrameMetrics], depth_threshold: f64, reps: Option<u32>) -> Self {
        let count = |status: FrameStatus| frames.iter().filter(|m| m.status == status).count();

        let min_knee_angle = frames
            .iter()
            .filter_map(|m| m.knee_angle)
            .min_by(f64::total_cmp);

        #[allow(clippy::cast_precision_loss)]
        let avg_processing_time = if frames.is_empty() {
            0.0
        } else {
            frames.iter().map(|m| m.processing_time).sum::<f64>() / frames.len() as f64
        };

        let overall_depth = match min_knee_angle {
            Some(angle) if angle < depth_threshold => OverallDepth::Achieved,
            Some(_) => OverallDepth::NeedsDeeper,
            None => OverallDepth::Undetermined,
        };

        Self {
            total_frames: frames.len(),
            frames_with_angle: frames.iter().filter(|m| m.knee_angle.is_some()).count(),
            missing_keypoint_frames: count(FrameStatus::MissingKeypoints),
            no_person_frames: count(FrameStatus::NoPersonDetected),
            inference_error_frames: count(FrameStatus::InferenceError),
            min_knee_angle,
            avg_processing_time,
            overall_depth,
            reps,
        }
    }
}

/// Complete result of processing one source.
#[derive(Debug, Clone, Serialize)]
pub struct VideoAnalysis {
    /// Source path or identifier.
    pub source: String,
    /// Frame rate used for output, defaulted when the source reports none.
    pub fps: f32,
    pub summary: AnalysisSummary,
    /// One record per decoded frame, in order.
    pub frames: Vec<FrameMetrics>,
}

impl VideoAnalysis {
    /// Whether any frame produced a knee angle.
    ///
    /// A run that opened its source but never saw a valid leg is still `Ok`; this is
    /// how callers tell it apart from a useful result.
    #[must_use]
    pub fn has_valid_metrics(&self) -> bool {
        self.summary.frames_with_angle > 0
    }
}
