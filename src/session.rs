// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Live rep-counting session.
//!
//! Wires the evaluator, the smoother and the rep counter together for a stream of
//! frames. A session owns its buffer and counter; start a new one per stream.

use crate::config::AnalysisConfig;
use crate::keypoint::{KeypointSet, ScoreSet};
use crate::reps::{RepCounter, SquatState, Transition};
use crate::smoothing::AngleBuffer;
use crate::squat::{SquatAnalysis, SquatEvaluator};

/// Result of feeding one frame into a [`LiveSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveUpdate {
    /// Per-frame evaluation before smoothing.
    pub analysis: SquatAnalysis,
    /// Moving average after this frame, if any angle has been seen.
    pub smoothed_angle: Option<f64>,
    /// State after this frame.
    pub state: SquatState,
    /// Rep total after this frame.
    pub reps: u32,
    /// Transition taken on this frame.
    pub transition: Option<Transition>,
}

/// Per-stream state for live rep counting.
#[derive(Debug, Clone)]
pub struct LiveSession {
    evaluator: SquatEvaluator,
    buffer: AngleBuffer,
    counter: RepCounter,
}

impl LiveSession {
    #[must_use]
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            evaluator: SquatEvaluator::new(config),
            buffer: AngleBuffer::new(config.smoothing_window),
            counter: RepCounter::new(config),
        }
    }

    /// Evaluate one person and advance the rep counter.
    ///
    /// Frames without a knee angle leave the buffer and the state untouched.
    pub fn process(&mut self, keypoints: &KeypointSet, scores: &ScoreSet) -> LiveUpdate {
        let analysis = self.evaluator.evaluate(keypoints, scores);
        let transition = analysis.knee_angle().and_then(|angle| self.observe(angle));
        self.update(analysis, transition)
    }

    /// Record a frame in which nobody was detected. State is held.
    pub fn skip(&mut self) -> LiveUpdate {
        self.update(SquatAnalysis::MissingKeypoints, None)
    }

    /// Push a raw knee angle and step the counter on the new average.
    pub fn observe(&mut self, angle: f64) -> Option<Transition> {
        if !self.buffer.push(angle) {
            return None;
        }
        self.buffer
            .average()
            .and_then(|smoothed| self.counter.update(smoothed))
    }

    #[must_use]
    pub const fn reps(&self) -> u32 {
        self.counter.reps()
    }

    #[must_use]
    pub const fn state(&self) -> SquatState {
        self.counter.state()
    }

    #[must_use]
    pub fn smoothed_angle(&self) -> Option<f64> {
        self.buffer.average()
    }

    /// Discard buffered angles and counts.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.counter.reset();
    }

    fn update(&self, analysis: SquatAnalysis, transition: Option<Transition>) -> LiveUpdate {
        LiveUpdate {
            analysis,
            smoothed_angle: self.buffer.average(),
            state: self.counter.state(),
            reps: self.counter.reps(),
            transition,
        }
    }
}

impl Default for LiveSession {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::{Keypoint, KeypointIndex};

    /// Right leg with the requested knee angle: thigh horizontal, shin rotated.
    fn leg_at(angle_deg: f64) -> (KeypointSet, ScoreSet) {
        let rad = angle_deg.to_radians();
        let mut kps = KeypointSet::undetected();
        kps.set(KeypointIndex::RightKnee, Keypoint::new(100.0, 100.0));
        kps.set(KeypointIndex::RightHip, Keypoint::new(150.0, 100.0));
        #[allow(clippy::cast_possible_truncation)]
        kps.set(
            KeypointIndex::RightAnkle,
            Keypoint::new(
                (100.0 + 50.0 * rad.cos()) as f32,
                (100.0 + 50.0 * rad.sin()) as f32,
            ),
        );
        (kps, ScoreSet::uniform(0.9))
    }

    #[test]
    fn test_counts_smoothed_rep() {
        let mut session = LiveSession::new(&AnalysisConfig::new().with_smoothing_window(1));
        let mut reps = 0;
        for angle in [175.0, 140.0, 100.0, 85.0, 120.0, 170.0] {
            let (kps, scores) = leg_at(angle);
            reps = session.process(&kps, &scores).reps;
        }
        assert_eq!(reps, 1);
        assert_eq!(session.state(), SquatState::Standing);
    }

    #[test]
    fn test_smoothing_delays_transition() {
        let mut session = LiveSession::default();
        // Average of [175, 175, 175, 80] = 151.25, still standing.
        for angle in [175.0, 175.0, 175.0] {
            let (kps, scores) = leg_at(angle);
            session.process(&kps, &scores);
        }
        let (kps, scores) = leg_at(80.0);
        let update = session.process(&kps, &scores);
        assert_eq!(update.state, SquatState::Standing);
        assert!((update.smoothed_angle.unwrap() - 151.25).abs() < 1e-2);
    }

    #[test]
    fn test_missing_keypoints_hold_state() {
        let mut session = LiveSession::new(&AnalysisConfig::new().with_smoothing_window(1));
        let (kps, scores) = leg_at(90.0);
        session.process(&kps, &scores);
        assert_eq!(session.state(), SquatState::Squatting);

        let update = session.process(&KeypointSet::undetected(), &ScoreSet::uniform(0.0));
        assert_eq!(update.analysis, SquatAnalysis::MissingKeypoints);
        assert_eq!(update.state, SquatState::Squatting);
        assert_eq!(update.transition, None);

        let update = session.skip();
        assert_eq!(update.state, SquatState::Squatting);
        assert_eq!(update.reps, 0);
    }

    #[test]
    fn test_reset_discards_state() {
        let mut session = LiveSession::new(&AnalysisConfig::new().with_smoothing_window(1));
        session.observe(90.0);
        session.observe(170.0);
        assert_eq!(session.reps(), 1);

        session.reset();
        assert_eq!(session.reps(), 0);
        assert!(session.smoothed_angle().is_none());
    }
}
