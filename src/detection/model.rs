//! Windowed statistical model of "normal" behaviour for one quantity.
//!
//! Holds the most recent `model_size` accepted values in arrival order.
//! Mean and sample standard deviation are derived from the window on demand
//! and cached until the next recompute or reset.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::{round3, Degeneracy, DetectionError};

/// Smallest window for which a sample standard deviation is defined.
pub const MIN_MODEL_SIZE: usize = 2;

/// Bounded FIFO of accepted observations plus derived mean / std-dev.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedStatModel {
    window: VecDeque<f64>,
    model_size: usize,
    mean: f64,
    std_dev: f64,
}

impl WindowedStatModel {
    /// Create an empty model with a fixed capacity.
    ///
    /// `model_size` below [`MIN_MODEL_SIZE`] is rejected: the n-1 standard
    /// deviation of a single value is undefined.
    pub fn new(model_size: usize) -> Result<Self, DetectionError> {
        if model_size < MIN_MODEL_SIZE {
            return Err(DetectionError::ModelTooSmall(model_size));
        }
        Ok(Self {
            window: VecDeque::with_capacity(model_size),
            model_size,
            mean: 0.0,
            std_dev: 0.0,
        })
    }

    pub fn model_size(&self) -> usize {
        self.model_size
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// True once the window holds exactly `model_size` values.
    pub fn is_complete(&self) -> bool {
        self.window.len() == self.model_size
    }

    /// Fill level in whole percent, truncated.
    pub fn completeness(&self) -> u8 {
        // len <= model_size, so the result is always within 0..=100
        u8::try_from(100 * self.window.len() / self.model_size).unwrap_or(100)
    }

    /// Append a value, evicting the oldest first when the window is full.
    pub fn accept(&mut self, value: f64) {
        if self.is_complete() {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Clear the window and derived statistics.
    pub fn reset(&mut self) {
        self.window.clear();
        self.mean = 0.0;
        self.std_dev = 0.0;
    }

    /// Mean from the last recompute (0 before the first one).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation from the last recompute (0 before the first one).
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Accepted values, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    /// Recompute the signed mean and sample standard deviation.
    ///
    /// On failure the previously cached statistics are kept.
    pub fn recompute(&mut self) -> Result<(), Degeneracy> {
        let (mean, std_dev) = self.window_stats()?;
        self.mean = mean;
        self.std_dev = std_dev;
        Ok(())
    }

    /// Recompute using the mean of magnitudes (rounded to 3 decimals) and the
    /// absolute sample standard deviation.
    pub fn recompute_magnitude(&mut self) -> Result<(), Degeneracy> {
        let (_, std_dev) = self.window_stats()?;
        let magnitude_mean = round3(self.window.iter().map(|v| v.abs()).mean());
        if !magnitude_mean.is_finite() {
            return Err(Degeneracy::NonFiniteStatistics {
                mean: magnitude_mean,
                std_dev,
            });
        }
        self.mean = magnitude_mean;
        self.std_dev = std_dev.abs();
        Ok(())
    }

    fn window_stats(&self) -> Result<(f64, f64), Degeneracy> {
        if self.window.len() < MIN_MODEL_SIZE {
            return Err(Degeneracy::InsufficientWindow(self.window.len()));
        }
        let mean = self.window.iter().mean();
        let std_dev = self.window.iter().std_dev();
        if !mean.is_finite() || !std_dev.is_finite() {
            return Err(Degeneracy::NonFiniteStatistics { mean, std_dev });
        }
        Ok((mean, std_dev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_single_value_window() {
        assert!(matches!(
            WindowedStatModel::new(1),
            Err(DetectionError::ModelTooSmall(1))
        ));
        assert!(WindowedStatModel::new(2).is_ok());
    }

    #[test]
    fn test_completeness_truncates() {
        let mut model = WindowedStatModel::new(3).unwrap();
        assert_eq!(model.completeness(), 0);
        model.accept(1.0);
        assert_eq!(model.completeness(), 33);
        model.accept(1.0);
        assert_eq!(model.completeness(), 66);
        model.accept(1.0);
        assert_eq!(model.completeness(), 100);
        assert!(model.is_complete());
    }

    #[test]
    fn test_fifo_eviction_keeps_capacity() {
        let mut model = WindowedStatModel::new(3).unwrap();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            model.accept(v);
        }
        assert_eq!(model.len(), 3);
        assert_eq!(model.values().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_sample_std_dev() {
        let mut model = WindowedStatModel::new(8).unwrap();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            model.accept(v);
        }
        model.recompute().unwrap();
        assert!((model.mean() - 5.0).abs() < 1e-9);
        // sum of squared deviations = 32, n-1 = 7
        assert!((model.std_dev() - (32.0_f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_magnitude_mean_ignores_sign() {
        let mut model = WindowedStatModel::new(4).unwrap();
        for v in [-2.0, 2.0, -4.0, 4.0] {
            model.accept(v);
        }
        model.recompute_magnitude().unwrap();
        assert!((model.mean() - 3.0).abs() < 1e-9);
        assert!(model.std_dev() > 0.0);
    }

    #[test]
    fn test_recompute_failure_keeps_previous_stats() {
        let mut model = WindowedStatModel::new(3).unwrap();
        for v in [1.0, 2.0, 3.0] {
            model.accept(v);
        }
        model.recompute().unwrap();
        let before = (model.mean(), model.std_dev());

        model.reset();
        model.accept(7.0);
        assert!(matches!(
            model.recompute(),
            Err(Degeneracy::InsufficientWindow(1))
        ));
        // reset zeroes the cache; the failed recompute must not touch it
        assert_eq!((model.mean(), model.std_dev()), (0.0, 0.0));
        assert_ne!(before, (0.0, 0.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut model = WindowedStatModel::new(2).unwrap();
        model.accept(1.0);
        model.accept(3.0);
        model.recompute().unwrap();
        model.reset();
        assert!(model.is_empty());
        assert_eq!(model.mean(), 0.0);
        assert_eq!(model.std_dev(), 0.0);
        assert_eq!(model.completeness(), 0);
    }
}
