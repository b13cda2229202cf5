//! Definite integral of a sampled waveform.

/// Plain sum of the samples (unit sample spacing).
///
/// An empty cycle integrates to zero.
pub fn definite_integral(samples: &[f64]) -> f64 {
    samples.iter().sum()
}
