// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::config::BodySide;
use crate::keypoint::KeypointIndex;

/// COCO-17 skeleton as pairs of keypoint indices.
pub const SKELETON: [[usize; 2]; 19] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [16, 14], // right ankle to right knee
    [14, 12], // right knee to right hip
    [11, 12], // left hip to right hip
    [5, 11],  // left shoulder to left hip
    [6, 12],  // right shoulder to right hip
    [5, 6],   // left shoulder to right shoulder
    [5, 7],   // left shoulder to left elbow
    [6, 8],   // right shoulder to right elbow
    [7, 9],   // left elbow to left wrist
    [8, 10],  // right elbow to right wrist
    [1, 2],   // left eye to right eye
    [0, 1],   // nose to left eye
    [0, 2],   // nose to right eye
    [1, 3],   // left eye to left ear
    [2, 4],   // right eye to right ear
    [3, 5],   // left ear to left shoulder
    [4, 6],   // right ear to right shoulder
];

/// Limb color indices into `POSE_COLORS`: legs orange, torso and arms blue, face green.
pub const LIMB_COLOR_INDICES: [usize; 19] = [
    0, 0, 0, 0, 7, 7, 7, 9, 9, 9, 9, 9, 16, 16, 16, 16, 16, 16, 16,
];

/// Keypoint color indices into `POSE_COLORS`.
pub const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0];

/// Skeleton edges of the measured leg (hip-knee and knee-ankle).
#[must_use]
pub fn leg_limbs(side: BodySide) -> [[usize; 2]; 2] {
    let [hip, knee, ankle] = side.leg().map(KeypointIndex::index);
    [[knee, hip], [ankle, knee]]
}
