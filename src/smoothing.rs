// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Moving average over recent knee angles.

use std::collections::VecDeque;

/// Bounded window of the most recent angle readings.
///
/// Non-finite readings are dropped at [`push`](Self::push), so the average is
/// always taken over real angles.
#[derive(Debug, Clone)]
pub struct AngleBuffer {
    readings: VecDeque<f64>,
    capacity: usize,
}

impl AngleBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a reading, evicting the oldest one when full.
    ///
    /// Returns `false` and leaves the buffer untouched if `angle` is not finite.
    pub fn push(&mut self, angle: f64) -> bool {
        if !angle.is_finite() {
            return false;
        }
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(angle);
        true
    }

    /// Arithmetic mean of the readings currently held, `None` when empty.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.readings.len() as f64;
        Some(self.readings.iter().sum::<f64>() / count)
    }

    /// Readings from oldest to newest.
    pub fn readings(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all readings.
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

impl Default for AngleBuffer {
    fn default() -> Self {
        Self::new(5)
    }
}
