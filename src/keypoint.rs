// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! COCO-17 keypoint layout and per-keypoint validation.

use std::ops::Index;

/// Number of keypoints in the COCO body layout.
pub const NUM_KEYPOINTS: usize = 17;

/// Anatomical names for the 17 COCO keypoints, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    /// Position of this keypoint inside a [`KeypointSet`] or [`ScoreSet`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A 2-D keypoint in frame pixel space.
///
/// Undetected points may carry `NaN` coordinates; [`is_valid_keypoint`] filters them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    /// Create a keypoint from pixel coordinates.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// A keypoint with both coordinates set to `NaN`.
    #[must_use]
    pub const fn undetected() -> Self {
        Self {
            x: f32::NAN,
            y: f32::NAN,
        }
    }

    /// Whether both coordinates are finite numbers.
    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self::undetected()
    }
}

impl From<(f32, f32)> for Keypoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// The 17 keypoints of one detected person.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeypointSet(pub [Keypoint; NUM_KEYPOINTS]);

impl KeypointSet {
    /// A set where every keypoint is undetected.
    #[must_use]
    pub const fn undetected() -> Self {
        Self([Keypoint::undetected(); NUM_KEYPOINTS])
    }

    /// Look up a keypoint by anatomical name.
    #[must_use]
    pub const fn get(&self, index: KeypointIndex) -> Keypoint {
        self.0[index.index()]
    }

    /// Replace a keypoint by anatomical name.
    pub const fn set(&mut self, index: KeypointIndex, keypoint: Keypoint) {
        self.0[index.index()] = keypoint;
    }

    /// Iterate over keypoints in layout order.
    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.0.iter()
    }
}

impl Default for KeypointSet {
    fn default() -> Self {
        Self::undetected()
    }
}

impl Index<KeypointIndex> for KeypointSet {
    type Output = Keypoint;

    fn index(&self, index: KeypointIndex) -> &Self::Output {
        &self.0[index.index()]
    }
}

/// Confidence scores parallel to a [`KeypointSet`].
///
/// Values are nominally in `[0, 1]` but the model does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSet(pub [f32; NUM_KEYPOINTS]);

impl ScoreSet {
    /// Every score set to `score`.
    #[must_use]
    pub const fn uniform(score: f32) -> Self {
        Self([score; NUM_KEYPOINTS])
    }

    /// Look up a score by anatomical name.
    #[must_use]
    pub const fn get(&self, index: KeypointIndex) -> f32 {
        self.0[index.index()]
    }

    /// Replace a score by anatomical name.
    pub const fn set(&mut self, index: KeypointIndex, score: f32) {
        self.0[index.index()] = score;
    }
}

impl Default for ScoreSet {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

impl Index<KeypointIndex> for ScoreSet {
    type Output = f32;

    fn index(&self, index: KeypointIndex) -> &Self::Output {
        &self.0[index.index()]
    }
}

/// Decide whether a keypoint is usable.
///
/// Valid iff `score` strictly exceeds `threshold` and both coordinates are finite.
/// A `NaN` score never exceeds the threshold, so it is rejected as well.
#[must_use]
pub fn is_valid_keypoint(keypoint: Keypoint, score: f32, threshold: f32) -> bool {
    score > threshold && keypoint.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keypoint() {
        assert!(is_valid_keypoint(Keypoint::new(10.0, 20.0), 0.9, 0.3));
        assert!(is_valid_keypoint(Keypoint::new(0.0, 0.0), 0.31, 0.3));
    }

    #[test]
    fn test_score_at_or_below_threshold_is_invalid() {
        let kp = Keypoint::new(10.0, 20.0);
        assert!(!is_valid_keypoint(kp, 0.3, 0.3));
        assert!(!is_valid_keypoint(kp, 0.1, 0.3));
        assert!(!is_valid_keypoint(kp, -1.0, 0.3));
        assert!(!is_valid_keypoint(kp, f32::NAN, 0.3));
    }

    #[test]
    fn test_nan_coordinates_are_invalid() {
        assert!(!is_valid_keypoint(Keypoint::new(f32::NAN, 5.0), 0.99, 0.3));
        assert!(!is_valid_keypoint(Keypoint::new(5.0, f32::NAN), 0.99, 0.3));
        assert!(!is_valid_keypoint(Keypoint::undetected(), 1.0, 0.0));
        assert!(!is_valid_keypoint(Keypoint::new(f32::INFINITY, 5.0), 0.99, 0.3));
    }

    #[test]
    fn test_keypoint_index_layout() {
        assert_eq!(KeypointIndex::Nose.index(), 0);
        assert_eq!(KeypointIndex::RightHip.index(), 12);
        assert_eq!(KeypointIndex::RightKnee.index(), 14);
        assert_eq!(KeypointIndex::RightAnkle.index(), 16);
        assert_eq!(KeypointIndex::LeftAnkle.index(), 15);
    }

    #[test]
    fn test_set_and_get() {
        let mut set = KeypointSet::undetected();
        set.set(KeypointIndex::RightKnee, Keypoint::new(1.0, 2.0));
        assert_eq!(set[KeypointIndex::RightKnee], Keypoint::new(1.0, 2.0));
        assert!(!set.get(KeypointIndex::LeftKnee).is_finite());

        let mut scores = ScoreSet::default();
        scores.set(KeypointIndex::RightKnee, 0.7);
        assert!((scores[KeypointIndex::RightKnee] - 0.7).abs() < f32::EPSILON);
    }
}
