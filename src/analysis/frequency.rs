// Frequency module - dominant oscillation frequency of a series
//
// Algorithm:
// 1. dt from the series' sampling estimate (first interval by default)
// 2. FFT of the full, unwindowed series
// 3. One-sided magnitude over the first ⌊N/2⌋ bins
// 4. Frequency of the largest bin
//
// Bin 0 is not excluded. A series with a large mean reports 0 Hz and the
// caller has to cope with that.

use crate::analysis::series::{SamplingEstimate, TimeSeries};
use crate::analysis::spectrum::fft::{bin_frequency, FftProcessor};

/// Spectral estimator of the dominant frequency
pub struct FrequencyEstimator {
    fft_processor: FftProcessor,
    sampling: SamplingEstimate,
}

impl FrequencyEstimator {
    /// Estimator using `t[1] - t[0]` as the sample spacing
    pub fn new() -> Self {
        Self::with_sampling(SamplingEstimate::FirstInterval)
    }

    pub fn with_sampling(sampling: SamplingEstimate) -> Self {
        Self {
            fft_processor: FftProcessor::new(),
            sampling,
        }
    }

    /// Dominant frequency in Hz
    ///
    /// Ties resolve to the lowest frequency bin.
    pub fn estimate(&self, series: &TimeSeries) -> f64 {
        let n = series.len();
        let sampling_hz = series.sampling_rate(self.sampling);
        let magnitude =
            self.fft_processor
                .compute_magnitude_spectrum(series.values(), None, n, n / 2);

        let mut best_bin = 0;
        for (k, &mag) in magnitude.iter().enumerate() {
            if mag > magnitude[best_bin] {
                best_bin = k;
            }
        }

        let frequency = bin_frequency(best_bin, n, sampling_hz);
        log::debug!(
            "[FrequencyEstimator] {} samples at {:.3} Hz, dominant bin {} -> {:.4} Hz",
            n,
            sampling_hz,
            best_bin,
            frequency
        );
        frequency
    }
}

impl Default for FrequencyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper around [`FrequencyEstimator::estimate`]
pub fn estimate_dominant_frequency(series: &TimeSeries) -> f64 {
    FrequencyEstimator::new().estimate(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_series(frequency: f64, sample_rate: f64, samples: usize) -> TimeSeries {
        let values = (0..samples)
            .map(|i| (2.0 * PI * frequency * i as f64 / sample_rate).sin())
            .collect();
        TimeSeries::from_uniform(sample_rate, values).unwrap()
    }

    #[test]
    fn test_recovers_sine_frequency_within_one_bin() {
        let sample_rate = 1000.0;
        let samples = 2000;
        let bin_width = sample_rate / samples as f64;

        for &f0 in &[3.3, 12.0, 47.25, 180.0] {
            let estimate = estimate_dominant_frequency(&sine_series(f0, sample_rate, samples));
            assert!(
                (estimate - f0).abs() <= bin_width,
                "expected {} Hz within {} Hz, got {}",
                f0,
                bin_width,
                estimate
            );
        }
    }

    #[test]
    fn test_dc_offset_dominates() {
        let base = sine_series(20.0, 500.0, 500);
        let shifted: Vec<f64> = base.values().iter().map(|v| v * 0.1 + 5.0).collect();
        let series = base.with_values(shifted).unwrap();
        assert_eq!(estimate_dominant_frequency(&series), 0.0);
    }

    #[test]
    fn test_two_sample_series() {
        let series = TimeSeries::new(vec![0.0, 0.5], vec![1.0, -1.0]).unwrap();
        // Only bin 0 is inspected for N = 2
        assert_eq!(estimate_dominant_frequency(&series), 0.0);
    }
}
