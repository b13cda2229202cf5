//! One detector per monitored quantity: model + policy + ratio tracker.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    AnomalyRatioTracker, DetectionError, Outcome, SigmaBandPolicy, WindowedStatModel,
    ZScorePolicy, DEFAULT_Z_SCORE_THRESHOLD,
};

// ============================================================================
// Policy Selection
// ============================================================================

/// Which threshold policy a detector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    ZScore,
    SigmaBand,
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z_score" | "zscore" => Ok(Self::ZScore),
            "sigma_band" | "sigma" => Ok(Self::SigmaBand),
            other => Err(format!(
                "unknown detection policy '{other}' (expected 'z_score' or 'sigma_band')"
            )),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZScore => write!(f, "z_score"),
            Self::SigmaBand => write!(f, "sigma_band"),
        }
    }
}

/// The two statistical policies a detector can run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    SigmaBand(SigmaBandPolicy),
    ZScore(ZScorePolicy),
}

impl ThresholdPolicy {
    fn evaluate(&mut self, model: &mut WindowedStatModel, value: f64) -> Outcome {
        match self {
            Self::SigmaBand(policy) => policy.evaluate(model, value),
            Self::ZScore(policy) => policy.evaluate(model, value),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::SigmaBand(policy) => policy.reset(),
            Self::ZScore(policy) => policy.reset(),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::SigmaBand(_) => PolicyKind::SigmaBand,
            Self::ZScore(_) => PolicyKind::ZScore,
        }
    }

    fn reading(&self, model: &WindowedStatModel) -> PolicyReading {
        match self {
            Self::SigmaBand(policy) => PolicyReading::SigmaBand {
                lower_bound: policy.lower_bound(),
                upper_bound: policy.upper_bound(),
                floor_engaged: policy.floor_engaged(model.std_dev()),
            },
            Self::ZScore(policy) => PolicyReading::ZScore {
                z_score: policy.z_score(),
                threshold: policy.threshold(),
            },
        }
    }
}

/// Policy-specific figures reported with each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PolicyReading {
    SigmaBand {
        lower_bound: f64,
        upper_bound: f64,
        floor_engaged: bool,
    },
    ZScore {
        z_score: f64,
        threshold: f64,
    },
}

// ============================================================================
// Detector
// ============================================================================

/// Construction parameters shared by every detector of a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSpec {
    pub model_size: usize,
    pub anomaly_list_size: usize,
    pub policy: PolicyKind,
    pub z_score_threshold: f64,
    pub sigma_floor_limit: f64,
}

impl DetectorSpec {
    pub fn z_score(model_size: usize, anomaly_list_size: usize, threshold: f64) -> Self {
        Self {
            model_size,
            anomaly_list_size,
            policy: PolicyKind::ZScore,
            z_score_threshold: threshold,
            sigma_floor_limit: 0.0,
        }
    }

    pub fn sigma_band(model_size: usize, anomaly_list_size: usize, floor_limit: f64) -> Self {
        Self {
            model_size,
            anomaly_list_size,
            policy: PolicyKind::SigmaBand,
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            sigma_floor_limit: floor_limit,
        }
    }
}

/// Result of feeding one value to a [`Detector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub value: f64,
    pub outcome: Outcome,
    /// Current anomaly flag (keeps its previous value while building).
    pub anomaly: bool,
    pub anomaly_ratio: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub reading: PolicyReading,
}

impl Evaluation {
    pub fn is_anomalous(&self) -> bool {
        self.anomaly
    }

    pub fn z_score(&self) -> Option<f64> {
        match self.reading {
            PolicyReading::ZScore { z_score, .. } => Some(z_score),
            PolicyReading::SigmaBand { .. } => None,
        }
    }

    pub fn threshold(&self) -> Option<f64> {
        match self.reading {
            PolicyReading::ZScore { threshold, .. } => Some(threshold),
            PolicyReading::SigmaBand { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    /// "device:quantity"
    id: String,
    model: WindowedStatModel,
    policy: ThresholdPolicy,
    tracker: AnomalyRatioTracker,
    anomaly: bool,
}

impl Detector {
    pub fn new(id: impl Into<String>, spec: &DetectorSpec) -> Result<Self, DetectionError> {
        let policy = match spec.policy {
            PolicyKind::ZScore => ThresholdPolicy::ZScore(ZScorePolicy::new(spec.z_score_threshold)),
            PolicyKind::SigmaBand => {
                ThresholdPolicy::SigmaBand(SigmaBandPolicy::new(spec.sigma_floor_limit)?)
            }
        };
        Ok(Self {
            id: id.into(),
            model: WindowedStatModel::new(spec.model_size)?,
            policy,
            tracker: AnomalyRatioTracker::new(spec.anomaly_list_size)?,
            anomaly: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &WindowedStatModel {
        &self.model
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn anomaly_ratio(&self) -> f64 {
        self.tracker.ratio()
    }

    /// Feed one value through the policy and ratio tracker.
    pub fn evaluate(&mut self, value: f64) -> Evaluation {
        let outcome = self.policy.evaluate(&mut self.model, value);

        match outcome {
            Outcome::Decided { verdict, .. } => {
                self.anomaly = verdict.is_anomalous();
                self.tracker.record(self.anomaly, self.model.is_complete());
            }
            Outcome::Building { completeness } => {
                debug!(quantity = %self.id, completeness, "Model building");
                self.tracker.record(self.anomaly, self.model.is_complete());
                if self.model.is_complete() {
                    info!(quantity = %self.id, size = self.model.model_size(), "Model complete");
                }
            }
            // state untouched
            Outcome::Degenerate(_) => {}
        }

        Evaluation {
            value,
            outcome,
            anomaly: self.anomaly,
            anomaly_ratio: self.tracker.ratio(),
            mean: self.model.mean(),
            std_dev: self.model.std_dev(),
            reading: self.policy.reading(&self.model),
        }
    }

    /// Forget everything learned; configuration is kept.
    pub fn reset(&mut self) {
        self.model.reset();
        self.policy.reset();
        self.tracker.reset();
        self.anomaly = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Verdict;

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("z_score".parse::<PolicyKind>().unwrap(), PolicyKind::ZScore);
        assert_eq!(" Sigma_Band ".parse::<PolicyKind>().unwrap(), PolicyKind::SigmaBand);
        assert!("median".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_invalid_spec_rejected() {
        assert!(Detector::new("d:q", &DetectorSpec::z_score(1, 5, 2.0)).is_err());
        assert!(Detector::new("d:q", &DetectorSpec::z_score(5, 0, 2.0)).is_err());
        assert!(Detector::new("d:q", &DetectorSpec::sigma_band(5, 5, -0.5)).is_err());
    }

    #[test]
    fn test_sigma_round_trip_flat_window() {
        let mut detector = Detector::new("press:x", &DetectorSpec::sigma_band(3, 2, 0.0)).unwrap();
        for _ in 0..3 {
            let eval = detector.evaluate(10.0);
            assert!(matches!(eval.outcome, Outcome::Building { .. }));
            assert!(!eval.is_anomalous());
        }
        let eval = detector.evaluate(10.0);
        assert_eq!(eval.outcome.verdict(), Some(Verdict::Normal));
        assert!(!eval.is_anomalous());
        assert_eq!(eval.mean, 10.0);
        assert_eq!(eval.std_dev, 0.0);
    }

    #[test]
    fn test_anomaly_flag_and_ratio() {
        let mut detector = Detector::new("press:x", &DetectorSpec::z_score(3, 2, 2.0)).unwrap();
        for v in [9.0, 10.0, 11.0] {
            detector.evaluate(v);
        }
        // building completion records one flag
        let first = detector.evaluate(50.0);
        assert!(first.is_anomalous());
        assert_eq!(first.anomaly_ratio, 0.0);

        let second = detector.evaluate(60.0);
        assert!(second.is_anomalous());
        assert_eq!(second.anomaly_ratio, 1.0);
        assert!(second.z_score().is_some());
        assert_eq!(second.threshold(), Some(2.0));
    }

    #[test]
    fn test_degenerate_keeps_flag() {
        let mut detector = Detector::new("press:x", &DetectorSpec::z_score(2, 1, 2.0)).unwrap();
        detector.evaluate(1.0);
        detector.evaluate(1.1);
        assert!(detector.evaluate(100.0).is_anomalous());
        let eval = detector.evaluate(f64::NAN);
        assert!(matches!(eval.outcome, Outcome::Degenerate(_)));
        assert!(eval.is_anomalous());
    }

    #[test]
    fn test_reset() {
        let mut detector = Detector::new("press:x", &DetectorSpec::z_score(2, 1, 2.0)).unwrap();
        detector.evaluate(1.0);
        detector.evaluate(2.0);
        detector.reset();
        assert!(detector.model().is_empty());
        assert_eq!(detector.anomaly_ratio(), 0.0);
        assert_eq!(detector.policy().kind(), PolicyKind::ZScore);
    }

    #[test]
    fn test_reset_clears_policy_readings() {
        let mut detector = Detector::new("press:x", &DetectorSpec::z_score(2, 1, 2.0)).unwrap();
        detector.evaluate(1.0);
        detector.evaluate(1.1);
        assert!(detector.evaluate(100.0).z_score().unwrap_or(0.0) > 2.0);

        detector.reset();
        let eval = detector.evaluate(5.0);
        assert!(matches!(eval.outcome, Outcome::Building { .. }));
        assert_eq!(eval.z_score(), Some(0.0));

        let mut band = Detector::new("press:y", &DetectorSpec::sigma_band(2, 1, 0.0)).unwrap();
        band.evaluate(1.0);
        band.evaluate(3.0);
        band.evaluate(2.0);
        band.reset();
        let eval = band.evaluate(5.0);
        assert!(matches!(
            eval.reading,
            PolicyReading::SigmaBand {
                lower_bound,
                upper_bound,
                ..
            } if lower_bound == 0.0 && upper_bound == 0.0
        ));
    }
}
