//! Adaptive Windowed Anomaly Detection
//!
//! Each monitored quantity (e.g. "phase-1 current integral") owns one
//! [`Detector`]: a sliding [`WindowedStatModel`] of recently accepted values,
//! a [`ThresholdPolicy`] that judges new values against it, and an
//! [`AnomalyRatioTracker`] summarising the last N decisions.
//!
//! ## Lifecycle
//!
//! 1. **Building**: the first `model_size` values are accepted unconditionally
//!    and no decision is produced.
//! 2. **Detecting**: every new value is judged. Normal values slide the window
//!    forward; anomalous values are discarded so the model only learns from
//!    what it considers normal.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = DetectorRegistry::new();
//! registry.register("press-3", quantities::EL_CURRENT_INTEGRAL_PH1, &spec)?;
//!
//! let evaluation = registry.evaluate("press-3", quantities::EL_CURRENT_INTEGRAL_PH1, 412.7)?;
//! if evaluation.is_anomalous() {
//!     // flag the cycle
//! }
//! ```

mod detector;
mod model;
mod ratio;
mod registry;
mod sigma_band;
mod zscore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use detector::{Detector, DetectorSpec, Evaluation, PolicyKind, PolicyReading, ThresholdPolicy};
pub use model::{WindowedStatModel, MIN_MODEL_SIZE};
pub use ratio::AnomalyRatioTracker;
pub use registry::{composite_id, quantities, DetectorRegistry, RegistryError};
pub use sigma_band::{SigmaBandPolicy, SIGMA_MULTIPLIER};
pub use zscore::{ZScorePolicy, DEFAULT_Z_SCORE_THRESHOLD, ZERO_STD_EPSILON};

// ============================================================================
// Error Types
// ============================================================================

/// Construction errors for detector components.
#[derive(Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("Model size must be at least {min}, got {0}", min = MIN_MODEL_SIZE)]
    ModelTooSmall(usize),

    #[error("Anomaly list size must be at least 1, got {0}")]
    RatioWindowTooSmall(usize),

    #[error("Sigma floor limit must be finite and >= 0, got {0}")]
    InvalidFloorLimit(f64),
}

/// Recoverable arithmetic degeneracy observed during an evaluation.
///
/// Either the evaluation was abandoned (prior state kept) or a documented
/// substitute value was used; [`Outcome`] says which.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
pub enum Degeneracy {
    #[error("window holds {0} value(s), statistics need at least 2")]
    InsufficientWindow(usize),

    #[error("window statistics are not finite (mean={mean}, std_dev={std_dev})")]
    NonFiniteStatistics { mean: f64, std_dev: f64 },

    #[error("input value {0} is not finite")]
    NonFiniteInput(f64),

    #[error("window std-dev is zero, substituted {substituted}")]
    ZeroStdDev { substituted: f64 },
}

// ============================================================================
// Evaluation Results
// ============================================================================

/// Judgement of a single value against a complete model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Normal,
    Anomalous,
}

impl Verdict {
    pub fn is_anomalous(self) -> bool {
        matches!(self, Verdict::Anomalous)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Normal => write!(f, "NORMAL"),
            Verdict::Anomalous => write!(f, "ANOMALY"),
        }
    }
}

/// What one call into a policy produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// Model still filling; the value was accepted and nothing was judged.
    Building { completeness: u8 },
    /// A decision was made, possibly after substituting a degenerate statistic.
    Decided {
        verdict: Verdict,
        substitution: Option<Degeneracy>,
    },
    /// Evaluation abandoned; model and policy state are unchanged.
    Degenerate(Degeneracy),
}

impl Outcome {
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Outcome::Decided { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }
}

/// Round to 3 decimal places, matching how ratios and z-scores are reported.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.123_456), 0.123);
        assert_eq!(round3(-1.2345_6), -1.235);
        assert_eq!(round3(2.0), 2.0);
    }

    #[test]
    fn test_outcome_verdict() {
        let building = Outcome::Building { completeness: 50 };
        assert_eq!(building.verdict(), None);

        let decided = Outcome::Decided {
            verdict: Verdict::Anomalous,
            substitution: None,
        };
        assert_eq!(decided.verdict(), Some(Verdict::Anomalous));
        assert!(Verdict::Anomalous.is_anomalous());
        assert!(!Verdict::Normal.is_anomalous());
    }
}
