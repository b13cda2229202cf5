//! Local-maximum peak detection for inrush current extraction.
//!
//! A sample is a peak when it is strictly greater than its left neighbour and
//! strictly greater than the first differing sample to its right. Flat tops
//! (plateaus) count once, at their middle sample (left-middle for an even
//! width). The first and last samples are never peaks.

use serde::Serialize;

/// One detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub index: usize,
    pub amplitude: f64,
}

/// All local maxima with amplitude `>= min_height`, in ascending time order.
pub fn find_peaks(samples: &[f64], min_height: f64) -> Vec<Peak> {
    let mut peaks = Vec::new();
    if samples.len() < 3 {
        return peaks;
    }

    let last = samples.len() - 1;
    let mut i = 1;
    while i < last {
        if samples[i - 1] < samples[i] {
            // walk across a possible plateau
            let mut ahead = i + 1;
            while ahead < last && samples[ahead] == samples[i] {
                ahead += 1;
            }

            if samples[ahead] < samples[i] {
                let index = (i + ahead - 1) / 2;
                if samples[index] >= min_height {
                    peaks.push(Peak {
                        index,
                        amplitude: samples[index],
                    });
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// The `peak_number`-th peak (1-indexed) at or above `min_height`.
///
/// `None` when fewer peaks exist or `peak_number` is 0.
pub fn nth_peak(samples: &[f64], min_height: f64, peak_number: usize) -> Option<Peak> {
    let position = peak_number.checked_sub(1)?;
    find_peaks(samples, min_height).get(position).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat baseline with unit spikes at the given indices.
    fn spikes(len: usize, at: &[usize], height: f64) -> Vec<f64> {
        let mut signal = vec![0.0; len];
        for &i in at {
            signal[i] = height;
        }
        signal
    }

    #[test]
    fn test_peaks_in_time_order() {
        let signal = spikes(20, &[3, 9, 15], 5.0);
        let indices: Vec<usize> = find_peaks(&signal, 1.0).iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![3, 9, 15]);
    }

    #[test]
    fn test_nth_peak_ordinal() {
        let signal = spikes(20, &[3, 9, 15], 5.0);
        assert_eq!(nth_peak(&signal, 1.0, 2).map(|p| p.index), Some(9));
        assert_eq!(nth_peak(&signal, 1.0, 1).map(|p| p.index), Some(3));
        assert_eq!(nth_peak(&signal, 1.0, 4), None);
        assert_eq!(nth_peak(&signal, 1.0, 0), None);
    }

    #[test]
    fn test_height_threshold_inclusive() {
        let signal = vec![0.0, 2.0, 0.0, 1.0, 0.0, 0.5, 0.0];
        let peaks = find_peaks(&signal, 1.0);
        assert_eq!(
            peaks,
            vec![
                Peak { index: 1, amplitude: 2.0 },
                Peak { index: 3, amplitude: 1.0 },
            ]
        );
    }

    #[test]
    fn test_edges_never_peaks() {
        let signal = vec![9.0, 1.0, 2.0, 1.0, 9.0];
        let peaks = find_peaks(&signal, 0.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 2);
    }

    #[test]
    fn test_plateau_reported_once_at_middle() {
        let odd = vec![0.0, 4.0, 4.0, 4.0, 0.0];
        assert_eq!(find_peaks(&odd, 1.0)[0].index, 2);

        let even = vec![0.0, 4.0, 4.0, 4.0, 4.0, 0.0];
        let peaks = find_peaks(&even, 1.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 2);
    }

    #[test]
    fn test_rising_plateau_not_a_peak() {
        // plateau followed by a higher value is a shoulder, not a maximum
        let signal = vec![0.0, 2.0, 2.0, 3.0, 0.0];
        let peaks = find_peaks(&signal, 0.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 3);
    }

    #[test]
    fn test_short_signals() {
        assert!(find_peaks(&[], 0.0).is_empty());
        assert!(find_peaks(&[1.0, 2.0], 0.0).is_empty());
    }
}
