//! Three-phase current asymmetry.

use super::SignalError;

/// Sum of absolute deviations of each phase from the three-phase mean, as a
/// percentage of that mean.
///
/// `(100, 100, 103)` gives mean 101, deviations 1 + 1 + 2, so 400 / 101 ≈ 3.96 %.
pub fn asymmetry_percent(ph1: f64, ph2: f64, ph3: f64) -> Result<f64, SignalError> {
    for value in [ph1, ph2, ph3] {
        if !value.is_finite() {
            return Err(SignalError::NonFinite(value));
        }
    }

    let mean = (ph1 + ph2 + ph3) / 3.0;
    if mean == 0.0 {
        return Err(SignalError::ZeroMeanTotal);
    }

    let deviation = (ph1 - mean).abs() + (ph2 - mean).abs() + (ph3 - mean).abs();
    Ok(100.0 * deviation / mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_phases_zero() {
        assert_eq!(asymmetry_percent(50.0, 50.0, 50.0).unwrap(), 0.0);
    }

    #[test]
    fn test_one_phase_high() {
        let pct = asymmetry_percent(100.0, 100.0, 103.0).unwrap();
        assert!((pct - 400.0 / 101.0).abs() < 1e-9);
        assert!((pct - 3.96).abs() < 0.005);
    }

    #[test]
    fn test_zero_mean_is_explicit_error() {
        assert_eq!(
            asymmetry_percent(0.0, 0.0, 0.0),
            Err(SignalError::ZeroMeanTotal)
        );
        assert_eq!(
            asymmetry_percent(-1.0, 0.0, 1.0),
            Err(SignalError::ZeroMeanTotal)
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            asymmetry_percent(f64::NAN, 1.0, 1.0),
            Err(SignalError::NonFinite(_))
        ));
    }
}
