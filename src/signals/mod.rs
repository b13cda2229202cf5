//! Derived Signal Calculators
//!
//! Stateless functions that reduce a buffered cycle of raw samples (or one
//! vibration reading) to the scalar quantities the detectors judge:
//!
//! - `integral`: definite integral of a phase current over the cycle
//! - `asymmetry`: inter-phase asymmetry of the three integrals, in percent
//! - `peaks`: inrush current as the Nth local maximum above a height
//! - `vibration`: total RMS acceleration across three axes

mod asymmetry;
mod integral;
mod peaks;
mod vibration;

use thiserror::Error;

pub use asymmetry::asymmetry_percent;
pub use integral::definite_integral;
pub use peaks::{find_peaks, nth_peak, Peak};
pub use vibration::total_rms;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SignalError {
    /// Phase totals average to zero, so asymmetry has no reference.
    #[error("Phase totals average to zero, asymmetry is undefined")]
    ZeroMeanTotal,

    #[error("Signal value is not finite: {0}")]
    NonFinite(f64),
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
