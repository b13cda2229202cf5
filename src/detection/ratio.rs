//! Rolling fraction of recent decisions that were anomalous.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{round3, DetectionError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRatioTracker {
    flags: VecDeque<bool>,
    capacity: usize,
    ratio: f64,
}

impl AnomalyRatioTracker {
    pub fn new(capacity: usize) -> Result<Self, DetectionError> {
        if capacity == 0 {
            return Err(DetectionError::RatioWindowTooSmall(capacity));
        }
        Ok(Self {
            flags: VecDeque::with_capacity(capacity),
            capacity,
            ratio: 0.0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Last published ratio, rounded to 3 decimals.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Record one decision and return the ratio in effect afterwards.
    ///
    /// Nothing is recorded until the model is complete. The ratio stays at its
    /// previous value until the flag list has filled once; after that every
    /// record evicts the oldest flag and republishes.
    pub fn record(&mut self, anomalous: bool, model_complete: bool) -> f64 {
        if !model_complete {
            return self.ratio;
        }

        if self.flags.len() < self.capacity {
            self.flags.push_back(anomalous);
            return self.ratio;
        }

        self.flags.pop_front();
        self.flags.push_back(anomalous);
        let flagged = self.flags.iter().filter(|f| **f).count();
        self.ratio = round3(flagged as f64 / self.capacity as f64);
        self.ratio
    }

    pub fn reset(&mut self) {
        self.flags.clear();
        self.ratio = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            AnomalyRatioTracker::new(0).unwrap_err(),
            DetectionError::RatioWindowTooSmall(0)
        );
    }

    #[test]
    fn test_ignored_while_model_incomplete() {
        let mut tracker = AnomalyRatioTracker::new(2).unwrap();
        tracker.record(true, false);
        tracker.record(true, false);
        assert!(tracker.is_empty());
        assert_eq!(tracker.ratio(), 0.0);
    }

    #[test]
    fn test_ratio_held_during_warm_up() {
        let mut tracker = AnomalyRatioTracker::new(3).unwrap();
        assert_eq!(tracker.record(true, true), 0.0);
        assert_eq!(tracker.record(true, true), 0.0);
        assert_eq!(tracker.record(true, true), 0.0);
        assert_eq!(tracker.len(), 3);

        // first record past capacity publishes
        assert_eq!(tracker.record(false, true), 0.667);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_ratio_tracks_window() {
        let mut tracker = AnomalyRatioTracker::new(4).unwrap();
        for flag in [false, false, false, false] {
            tracker.record(flag, true);
        }
        assert_eq!(tracker.record(true, true), 0.25);
        assert_eq!(tracker.record(true, true), 0.5);
        for _ in 0..4 {
            tracker.record(false, true);
        }
        assert_eq!(tracker.ratio(), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut tracker = AnomalyRatioTracker::new(1).unwrap();
        tracker.record(true, true);
        tracker.record(true, true);
        assert_eq!(tracker.ratio(), 1.0);
        tracker.reset();
        assert!(tracker.is_empty());
        assert_eq!(tracker.ratio(), 0.0);
    }
}
