// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Squat Form Analysis
//!
//! Frame-by-frame squat analysis on top of a YOLO pose model running in
//! [ONNX Runtime](https://onnxruntime.ai). For every frame the library finds the
//! primary person, measures the hip-knee-ankle angle on one leg, classifies squat
//! depth and, optionally, counts repetitions with a smoothed-angle state machine.
//!
//! ## Features
//!
//! - **Kinematics** - keypoint validation, knee angle and depth feedback per frame
//! - **Rep counting** - moving-average smoothing with 110°/160° hysteresis
//! - **Pose model** - any Ultralytics YOLO pose export, metadata read from the ONNX file
//! - **Sources** - images, directories, glob patterns and (with `video`) video files
//! - **Outputs** - annotated mp4, GIF or frames, plus CSV and JSON reports
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use squat_form::{AnalysisConfig, PoseModel, Source, VideoProcessor};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let model = PoseModel::load("yolo11n-pose.onnx")?;
//!     let config = AnalysisConfig::new().with_depth_threshold(95.0);
//!
//!     let mut processor = VideoProcessor::new(model, config)?.with_rep_counting(true);
//!     let analysis = processor.analyze("squat.mp4".parse::<Source>()?)?;
//!
//!     println!("{}", analysis.summary.overall_depth);
//!     println!("reps: {:?}", analysis.summary.reps);
//!     Ok(())
//! }
//! ```
//!
//! ## Single Frames
//!
//! The kinematic layer works on plain keypoint arrays and needs no model:
//!
//! ```rust
//! use squat_form::{
//!     AnalysisConfig, DepthFeedback, Keypoint, KeypointIndex, KeypointSet, ScoreSet,
//!     SquatEvaluator,
//! };
//!
//! let mut keypoints = KeypointSet::undetected();
//! keypoints.set(KeypointIndex::RightHip, Keypoint::new(100.0, 100.0));
//! keypoints.set(KeypointIndex::RightKnee, Keypoint::new(100.0, 200.0));
//! keypoints.set(KeypointIndex::RightAnkle, Keypoint::new(200.0, 200.0));
//!
//! let evaluator = SquatEvaluator::new(&AnalysisConfig::default());
//! let analysis = evaluator.evaluate(&keypoints, &ScoreSet::uniform(0.9));
//!
//! assert_eq!(analysis.depth(), Some(DepthFeedback::BelowParallel));
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Analyze a video, count reps and export per-frame metrics
//! squat-form analyze --source squat.mp4 --count-reps --csv metrics.csv
//!
//! # Save an annotated GIF to runs/squat/analyze
//! squat-form analyze -s squat.mp4 --save --format gif
//!
//! # Measure the left leg with a stricter depth threshold
//! squat-form analyze -s frames/ --side left --depth-threshold 90
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `annotate` | yes | Skeleton and metrics overlay |
//! | `visualize` | yes | Preview window |
//! | `video` | no | Video decode and mp4 encode via `FFmpeg` |
//! | `cuda` | no | NVIDIA CUDA execution provider |
//! | `tensorrt` | no | NVIDIA `TensorRT` execution provider |
//! | `coreml` | no | Apple `CoreML` execution provider |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod cli;
pub mod config;
pub mod device;
pub mod download;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod io;
pub mod keypoint;
pub mod metrics;
pub mod pose;
pub mod processor;
pub mod reps;
pub mod report;
pub mod session;
pub mod smoothing;
pub mod source;
pub mod squat;
pub mod visualizer;

// Re-export main types for convenience
pub use config::{AnalysisConfig, BodySide};
pub use device::Device;
pub use error::{AnalysisError, Result};
pub use geometry::calculate_angle;
pub use inference::InferenceConfig;
pub use keypoint::{Keypoint, KeypointIndex, KeypointSet, ScoreSet, is_valid_keypoint};
pub use metrics::{AnalysisSummary, FrameMetrics, FrameStatus, OverallDepth, VideoAnalysis};
pub use pose::{ModelMetadata, PoseEstimate, PoseEstimator, PoseModel};
pub use processor::{FrameOutcome, VideoProcessor};
pub use reps::{RepCounter, SquatState, Transition};
pub use session::{LiveSession, LiveUpdate};
pub use smoothing::AngleBuffer;
pub use source::{Source, SourceIterator, SourceMeta};
pub use squat::{DepthFeedback, SquatAnalysis, SquatEvaluator, ValgusFeedback};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
        assert_eq!(NAME, "squat-form");
    }
}
