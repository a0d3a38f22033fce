// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose estimation backends.
//!
//! The analysis core only depends on the [`PoseEstimator`] trait: give it a frame,
//! get back one [`KeypointSet`] and one [`ScoreSet`] per detected person. The
//! bundled implementation is [`PoseModel`], an ONNX Runtime session over a
//! YOLO-pose export.

pub mod metadata;
pub mod model;
pub mod postprocess;
pub mod preprocess;

use image::DynamicImage;
use ndarray::ArrayView3;

use crate::error::{AnalysisError, Result};
use crate::keypoint::{Keypoint, KeypointSet, NUM_KEYPOINTS, ScoreSet};

pub use metadata::ModelMetadata;
pub use model::PoseModel;

/// Anything that can find people and their keypoints in a frame.
pub trait PoseEstimator {
    /// Detect people in `image`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails on this frame. Callers analysing a
    /// video record the frame as failed and keep going.
    fn estimate(&mut self, image: &DynamicImage) -> Result<PoseEstimate>;
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for Box<E> {
    fn estimate(&mut self, image: &DynamicImage) -> Result<PoseEstimate> {
        (**self).estimate(image)
    }
}

impl<E: PoseEstimator + ?Sized> PoseEstimator for &mut E {
    fn estimate(&mut self, image: &DynamicImage) -> Result<PoseEstimate> {
        (**self).estimate(image)
    }
}

/// Timing information for one estimate (in milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Speed {
    pub preprocess: f64,
    pub inference: f64,
    pub postprocess: f64,
}

impl Speed {
    /// Sum of all stages in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess + self.inference + self.postprocess
    }
}

/// Person bounding box in frame pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonBox {
    /// Box corners `[x1, y1, x2, y2]`.
    pub xyxy: [f32; 4],
    /// Detection confidence.
    pub confidence: f32,
}

/// People found in one frame.
///
/// `keypoints` and `scores` are parallel and ordered by detection confidence, so
/// index 0 is the primary subject. `boxes` is either empty or parallel as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseEstimate {
    pub keypoints: Vec<KeypointSet>,
    pub scores: Vec<ScoreSet>,
    pub boxes: Vec<PersonBox>,
    pub speed: Speed,
}

impl PoseEstimate {
    /// A frame with nobody in it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an `(N, 17, 3)` array of `x, y, confidence` triples.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InferenceError`] if the array is not `(N, 17, 3)`.
    pub fn from_array(data: ArrayView3<'_, f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[1] != NUM_KEYPOINTS || shape[2] != 3 {
            return Err(AnalysisError::InferenceError(format!(
                "expected keypoints of shape (N, {NUM_KEYPOINTS}, 3), got {shape:?}"
            )));
        }

        let mut estimate = Self::default();
        for person in data.outer_iter() {
            let mut keypoints = KeypointSet::undetected();
            let mut scores = ScoreSet::default();
            for (k, row) in person.outer_iter().enumerate() {
                keypoints.0[k] = Keypoint::new(row[0], row[1]);
                scores.0[k] = row[2];
            }
            estimate.push(keypoints, scores, None);
        }
        Ok(estimate)
    }

    /// Append a person.
    pub fn push(&mut self, keypoints: KeypointSet, scores: ScoreSet, bbox: Option<PersonBox>) {
        self.keypoints.push(keypoints);
        self.scores.push(scores);
        if let Some(bbox) = bbox {
            self.boxes.push(bbox);
        }
    }

    /// Number of detected people.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len().min(self.scores.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keypoints and scores of the primary subject.
    #[must_use]
    pub fn primary(&self) -> Option<(&KeypointSet, &ScoreSet)> {
        self.keypoints.first().zip(self.scores.first())
    }

    /// Iterate over `(keypoints, scores)` for every person.
    pub fn people(&self) -> impl Iterator<Item = (&KeypointSet, &ScoreSet)> {
        self.keypoints.iter().zip(self.scores.iter())
    }
}
