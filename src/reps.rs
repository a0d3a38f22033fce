// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Squat repetition counting.
//!
//! A two-state machine driven by the smoothed knee angle. Entering the squat and
//! standing back up use different thresholds, so noise around a single boundary
//! cannot toggle the state. A rep is credited when the lifter returns to standing.
//!
//! | State     | Condition              | Next      | Effect    |
//! |-----------|------------------------|-----------|-----------|
//! | Standing  | angle < squat threshold | Squatting |           |
//! | Squatting | angle > rise threshold  | Standing  | reps += 1 |

use std::fmt;

use crate::config::AnalysisConfig;

/// Lifter position tracked across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SquatState {
    #[default]
    Standing,
    Squatting,
}

impl SquatState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standing => "standing",
            Self::Squatting => "squatting",
        }
    }
}

impl fmt::Display for SquatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change produced by [`RepCounter::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Standing to squatting.
    EnteredSquat,
    /// Squatting to standing; carries the new rep total.
    CompletedRep(u32),
}

/// Hysteresis state machine counting full squat cycles.
#[derive(Debug, Clone)]
pub struct RepCounter {
    state: SquatState,
    reps: u32,
    squat_threshold: f64,
    rise_threshold: f64,
}

impl RepCounter {
    /// Create a counter in the standing state with zero reps.
    #[must_use]
    pub const fn new(config: &AnalysisConfig) -> Self {
        Self::with_thresholds(config.squat_entry_threshold, config.rise_threshold)
    }

    /// Create a counter from explicit thresholds in degrees.
    #[must_use]
    pub const fn with_thresholds(squat_threshold: f64, rise_threshold: f64) -> Self {
        Self {
            state: SquatState::Standing,
            reps: 0,
            squat_threshold,
            rise_threshold,
        }
    }

    /// Feed one smoothed knee angle.
    ///
    /// Returns the transition taken, if any. Non-finite angles never transition.
    pub fn update(&mut self, smoothed_angle: f64) -> Option<Transition> {
        if !smoothed_angle.is_finite() {
            return None;
        }
        match self.state {
            SquatState::Standing if smoothed_angle < self.squat_threshold => {
                self.state = SquatState::Squatting;
                Some(Transition::EnteredSquat)
            }
            SquatState::Squatting if smoothed_angle > self.rise_threshold => {
                self.state = SquatState::Standing;
                self.reps = self.reps.saturating_add(1);
                Some(Transition::CompletedRep(self.reps))
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SquatState {
        self.state
    }

    /// Completed repetitions so far.
    #[must_use]
    pub const fn reps(&self) -> u32 {
        self.reps
    }

    /// Return to standing with zero reps.
    pub const fn reset(&mut self) {
        self.state = SquatState::Standing;
        self.reps = 0;
    }
}

impl Default for RepCounter {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}
