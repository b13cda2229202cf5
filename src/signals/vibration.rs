//! Vibration magnitude across axes.

use super::round_to;

/// Euclidean norm of the three per-axis RMS accelerations, rounded to 5 places.
pub fn total_rms(x: f64, y: f64, z: f64) -> f64 {
    round_to((x * x + y * y + z * z).sqrt(), 5)
}
