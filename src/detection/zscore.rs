//! Z-score threshold applied to the magnitude of each value.
//!
//! The model mean is the mean of absolute values, and the incoming value is
//! compared by magnitude as well, so a reading and its negation always
//! produce the same z-score.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{round3, Degeneracy, Outcome, Verdict, WindowedStatModel};

/// Threshold used when an invalid one is configured.
pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 2.0;

/// Stand-in standard deviation for a window with zero spread.
pub const ZERO_STD_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZScorePolicy {
    threshold: f64,
    /// Signed z-score from the last complete evaluation.
    z_score: f64,
    /// Std-dev actually divided by in the last complete evaluation.
    effective_std_dev: f64,
}

impl Default for ZScorePolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_Z_SCORE_THRESHOLD,
            z_score: 0.0,
            effective_std_dev: 0.0,
        }
    }
}

impl ZScorePolicy {
    pub fn new(threshold: f64) -> Self {
        let mut policy = Self::default();
        policy.set_threshold(threshold);
        policy
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn z_score(&self) -> f64 {
        self.z_score
    }

    pub fn effective_std_dev(&self) -> f64 {
        self.effective_std_dev
    }

    /// Set the threshold, returning the value now in effect.
    ///
    /// Zero, negative and non-finite thresholds would flag everything (or
    /// nothing), so they are replaced by [`DEFAULT_Z_SCORE_THRESHOLD`].
    pub fn set_threshold(&mut self, threshold: f64) -> f64 {
        if threshold.is_finite() && threshold > 0.0 {
            self.threshold = threshold;
        } else {
            warn!(
                requested = threshold,
                fallback = DEFAULT_Z_SCORE_THRESHOLD,
                "Z-score threshold must be positive, using default"
            );
            self.threshold = DEFAULT_Z_SCORE_THRESHOLD;
        }
        self.threshold
    }

    /// Forget the last evaluation; the threshold is kept.
    pub fn reset(&mut self) {
        self.z_score = 0.0;
        self.effective_std_dev = 0.0;
    }

    /// Judge `value` against `model`, sliding the window on a normal verdict.
    pub fn evaluate(&mut self, model: &mut WindowedStatModel, value: f64) -> Outcome {
        if !value.is_finite() {
            warn!(value, "Z-score: rejecting non-finite input");
            return Outcome::Degenerate(Degeneracy::NonFiniteInput(value));
        }

        if !model.is_complete() {
            model.accept(value);
            debug!(completeness = model.completeness(), "Z-score: building model");
            return Outcome::Building {
                completeness: model.completeness(),
            };
        }

        if let Err(reason) = model.recompute_magnitude() {
            warn!(%reason, "Z-score: statistics unavailable, keeping previous state");
            return Outcome::Degenerate(reason);
        }

        let (std_dev, substitution) = if model.std_dev() == 0.0 {
            let substituted = Degeneracy::ZeroStdDev {
                substituted: ZERO_STD_EPSILON,
            };
            debug!(%substituted, "Z-score: flat window");
            (ZERO_STD_EPSILON, Some(substituted))
        } else {
            (model.std_dev(), None)
        };

        let z_score = round3((value.abs() - model.mean()) / std_dev);
        if !z_score.is_finite() {
            warn!(value, mean = model.mean(), std_dev, "Z-score: overflow, keeping previous state");
            return Outcome::Degenerate(Degeneracy::NonFiniteStatistics {
                mean: model.mean(),
                std_dev,
            });
        }

        self.z_score = z_score;
        self.effective_std_dev = std_dev;

        let verdict = if z_score.abs() > self.threshold {
            Verdict::Anomalous
        } else {
            model.accept(value);
            Verdict::Normal
        };

        Outcome::Decided {
            verdict,
            substitution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[f64]) -> WindowedStatModel {
        let mut model = WindowedStatModel::new(values.len()).unwrap();
        for v in values {
            model.accept(*v);
        }
        model
    }

    #[test]
    fn test_zero_threshold_falls_back_to_default() {
        let mut policy = ZScorePolicy::new(3.5);
        assert_eq!(policy.threshold(), 3.5);
        assert_eq!(policy.set_threshold(0.0), DEFAULT_Z_SCORE_THRESHOLD);
        assert_eq!(policy.set_threshold(-1.0), DEFAULT_Z_SCORE_THRESHOLD);
        assert_eq!(policy.set_threshold(f64::INFINITY), DEFAULT_Z_SCORE_THRESHOLD);
    }

    #[test]
    fn test_flat_window_substitutes_epsilon() {
        let mut policy = ZScorePolicy::new(2.0);
        let mut model = filled(&[10.0, 10.0, 10.0]);
        let outcome = policy.evaluate(&mut model, 10.0);
        assert_eq!(
            outcome,
            Outcome::Decided {
                verdict: Verdict::Normal,
                substitution: Some(Degeneracy::ZeroStdDev {
                    substituted: ZERO_STD_EPSILON
                }),
            }
        );
        assert_eq!(policy.z_score(), 0.0);
        assert_eq!(policy.effective_std_dev(), ZERO_STD_EPSILON);
    }

    #[test]
    fn test_flat_window_flags_small_step() {
        let mut policy = ZScorePolicy::new(2.0);
        let mut model = filled(&[10.0, 10.0, 10.0]);
        // 0.01 / 0.001 = 10 sigma
        let outcome = policy.evaluate(&mut model, 10.01);
        assert_eq!(outcome.verdict(), Some(Verdict::Anomalous));
        assert_eq!(model.values().collect::<Vec<_>>(), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_sign_insensitive() {
        let window = [4.0, -5.0, 6.0, -5.0];
        let mut a = ZScorePolicy::new(2.0);
        let mut b = ZScorePolicy::new(2.0);
        let mut model_a = filled(&window);
        let mut model_b = filled(&window);

        let out_a = a.evaluate(&mut model_a, 7.5);
        let out_b = b.evaluate(&mut model_b, -7.5);
        assert_eq!(out_a.verdict(), out_b.verdict());
        assert_eq!(a.z_score(), b.z_score());
    }

    #[test]
    fn test_z_score_rounded_to_three_places() {
        let mut policy = ZScorePolicy::new(100.0);
        let mut model = filled(&[1.0, 2.0, 3.0]);
        policy.evaluate(&mut model, 3.0);
        // mean 2, std 1 => z = 1
        assert_eq!(policy.z_score(), 1.0);

        let mut model = filled(&[1.0, 2.0, 4.0]);
        policy.evaluate(&mut model, 0.0);
        let expected = round3((0.0 - 2.333) / model.std_dev());
        assert_eq!(policy.z_score(), expected);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut policy = ZScorePolicy::new(1.0);
        let mut model = filled(&[1.0, 2.0, 3.0]);
        // z == threshold exactly is still normal
        let outcome = policy.evaluate(&mut model, 3.0);
        assert_eq!(outcome.verdict(), Some(Verdict::Normal));
    }

    #[test]
    fn test_building_then_deciding() {
        let mut policy = ZScorePolicy::default();
        let mut model = WindowedStatModel::new(2).unwrap();
        assert!(matches!(
            policy.evaluate(&mut model, 5.0),
            Outcome::Building { completeness: 50 }
        ));
        assert!(matches!(
            policy.evaluate(&mut model, 6.0),
            Outcome::Building { completeness: 100 }
        ));
        assert!(policy.evaluate(&mut model, 5.5).verdict().is_some());
    }
}
