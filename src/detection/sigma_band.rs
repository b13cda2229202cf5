//! Fixed ±3σ band with a floor clamp.
//!
//! When the window's spread collapses (e.g. a value quantised below its
//! sampling resolution), a ±3σ band would flag nearly every new point. A
//! positive `floor_limit` widens the band to `mean ± floor_limit` whenever the
//! standard deviation drops below it.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DetectionError, Degeneracy, Outcome, Verdict, WindowedStatModel};

/// Band half-width in standard deviations.
pub const SIGMA_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmaBandPolicy {
    /// Minimum band half-width; 0 disables the clamp.
    floor_limit: f64,
    upper_bound: f64,
    lower_bound: f64,
}

impl SigmaBandPolicy {
    pub fn new(floor_limit: f64) -> Result<Self, DetectionError> {
        if !floor_limit.is_finite() || floor_limit < 0.0 {
            return Err(DetectionError::InvalidFloorLimit(floor_limit));
        }
        Ok(Self {
            floor_limit,
            upper_bound: 0.0,
            lower_bound: 0.0,
        })
    }

    pub fn floor_limit(&self) -> f64 {
        self.floor_limit
    }

    /// Upper bound from the last complete evaluation.
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    /// Lower bound from the last complete evaluation.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Whether the floor clamp applies for the given spread.
    pub fn floor_engaged(&self, std_dev: f64) -> bool {
        self.floor_limit > 0.0 && std_dev < self.floor_limit
    }

    /// Bounds for a model with the given mean and spread.
    pub fn bounds_for(&self, mean: f64, std_dev: f64) -> (f64, f64) {
        let half_width = if self.floor_engaged(std_dev) {
            self.floor_limit
        } else {
            SIGMA_MULTIPLIER * std_dev
        };
        (mean - half_width, mean + half_width)
    }

    /// Forget the last bounds; the floor is kept.
    pub fn reset(&mut self) {
        self.upper_bound = 0.0;
        self.lower_bound = 0.0;
    }

    /// Judge `value` against `model`, sliding the window on a normal verdict.
    pub fn evaluate(&mut self, model: &mut WindowedStatModel, value: f64) -> Outcome {
        if !value.is_finite() {
            warn!(value, "Sigma band: rejecting non-finite input");
            return Outcome::Degenerate(Degeneracy::NonFiniteInput(value));
        }

        if !model.is_complete() {
            model.accept(value);
            debug!(completeness = model.completeness(), "Sigma band: building model");
            return Outcome::Building {
                completeness: model.completeness(),
            };
        }

        if let Err(reason) = model.recompute() {
            warn!(%reason, "Sigma band: statistics unavailable, keeping previous state");
            return Outcome::Degenerate(reason);
        }

        let (lower, upper) = self.bounds_for(model.mean(), model.std_dev());
        self.lower_bound = lower;
        self.upper_bound = upper;

        let verdict = if (lower..=upper).contains(&value) {
            model.accept(value);
            Verdict::Normal
        } else {
            Verdict::Anomalous
        };

        Outcome::Decided {
            verdict,
            substitution: None,
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
    fn test_rejects_negative_floor() {
        assert!(SigmaBandPolicy::new(-1.0).is_err());
        assert!(SigmaBandPolicy::new(f64::NAN).is_err());
        assert!(SigmaBandPolicy::new(0.0).is_ok());
    }

    #[test]
    fn test_building_phase_accepts_everything() {
        let mut policy = SigmaBandPolicy::new(0.0).unwrap();
        let mut model = WindowedStatModel::new(3).unwrap();
        assert_eq!(
            policy.evaluate(&mut model, 1.0),
            Outcome::Building { completeness: 33 }
        );
        assert_eq!(
            policy.evaluate(&mut model, 1_000.0),
            Outcome::Building { completeness: 66 }
        );
        assert_eq!(
            policy.evaluate(&mut model, -50.0),
            Outcome::Building { completeness: 100 }
        );
        assert!(model.is_complete());
        // bounds are not touched while building
        assert_eq!((policy.lower_bound(), policy.upper_bound()), (0.0, 0.0));
    }

    #[test]
    fn test_zero_spread_accepts_boundary_value() {
        let mut policy = SigmaBandPolicy::new(0.0).unwrap();
        let mut model = filled(&[10.0, 10.0, 10.0]);
        let outcome = policy.evaluate(&mut model, 10.0);
        assert_eq!(outcome.verdict(), Some(Verdict::Normal));
        assert_eq!(policy.lower_bound(), 10.0);
        assert_eq!(policy.upper_bound(), 10.0);
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_anomalous_value_not_learned() {
        let mut policy = SigmaBandPolicy::new(0.0).unwrap();
        let mut model = filled(&[9.0, 10.0, 11.0]);
        let outcome = policy.evaluate(&mut model, 100.0);
        assert_eq!(outcome.verdict(), Some(Verdict::Anomalous));
        assert_eq!(model.values().collect::<Vec<_>>(), vec![9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_floor_widens_collapsed_band() {
        let policy = SigmaBandPolicy::new(5.0).unwrap();
        let (lower, upper) = policy.bounds_for(100.0, 0.01);
        assert!((lower - 95.0).abs() < 1e-9);
        assert!((upper - 105.0).abs() < 1e-9);

        // spread above the floor uses 3 sigma
        let (lower, upper) = policy.bounds_for(100.0, 10.0);
        assert!((lower - 70.0).abs() < 1e-9);
        assert!((upper - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_input_is_degenerate() {
        let mut policy = SigmaBandPolicy::new(0.0).unwrap();
        let mut model = filled(&[1.0, 2.0, 3.0]);
        let outcome = policy.evaluate(&mut model, f64::NAN);
        assert!(matches!(
            outcome,
            Outcome::Degenerate(Degeneracy::NonFiniteInput(_))
        ));
        assert_eq!(model.values().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }
}
