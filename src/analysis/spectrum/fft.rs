// FFT module - Fast Fourier Transform computation
//
// This module handles forward FFTs of real-valued signals with optional
// window coefficients and zero-padding. Magnitude spectra are consumed by
// the frequency estimator, the full-spectrum analyzer and the STFT.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Mutex, PoisonError};

/// FFT processor that computes one-sided spectra from real signals
pub struct FftProcessor {
    fft_planner: Mutex<FftPlanner<f64>>,
}

impl FftProcessor {
    pub fn new() -> Self {
        Self {
            fft_planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Compute the complex spectrum of a real signal
    ///
    /// # Arguments
    /// * `samples` - Time-domain samples (truncated to `fft_len` if longer)
    /// * `window` - Optional window coefficients, same length as the used samples
    /// * `fft_len` - Transform length; shorter input is zero-padded
    ///
    /// # Returns
    /// All `fft_len` complex bins
    pub fn compute_spectrum(
        &self,
        samples: &[f64],
        window: Option<&[f64]>,
        fft_len: usize,
    ) -> Vec<Complex<f64>> {
        let used = samples.len().min(fft_len);
        let mut buffer: Vec<Complex<f64>> = Vec::with_capacity(fft_len);

        match window {
            Some(coefficients) => buffer.extend(
                samples[..used]
                    .iter()
                    .zip(coefficients.iter())
                    .map(|(&sample, &w)| Complex::new(sample * w, 0.0)),
            ),
            None => buffer.extend(samples[..used].iter().map(|&s| Complex::new(s, 0.0))),
        }

        // Pad with zeros if needed
        buffer.resize(fft_len, Complex::new(0.0, 0.0));

        if fft_len == 0 {
            return buffer;
        }

        let fft = {
            // Cached plans stay valid after a poisoned lock
            let mut planner = self
                .fft_planner
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            planner.plan_fft_forward(fft_len)
        };
        fft.process(&mut buffer);
        buffer
    }

    /// Compute |FFT| for the first `bins` positive-frequency bins
    pub fn compute_magnitude_spectrum(
        &self,
        samples: &[f64],
        window: Option<&[f64]>,
        fft_len: usize,
        bins: usize,
    ) -> Vec<f64> {
        let spectrum = self.compute_spectrum(samples, window, fft_len);
        spectrum[..bins.min(spectrum.len())]
            .iter()
            .map(|c| c.norm())
            .collect()
    }
}

impl Default for FftProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency of bin `k` for a transform of length `fft_len`
pub fn bin_frequency(k: usize, fft_len: usize, sampling_hz: f64) -> f64 {
    k as f64 * sampling_hz / fft_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_pure_tone_lands_in_expected_bin() {
        let n = 64;
        let signal: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / n as f64).sin())
            .collect();
        let processor = FftProcessor::new();
        let magnitude = processor.compute_magnitude_spectrum(&signal, None, n, n / 2);

        let (peak_bin, _) = magnitude
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak_bin, 8);
        assert!((magnitude[8] - n as f64 / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_padding_extends_length() {
        let processor = FftProcessor::new();
        let spectrum = processor.compute_spectrum(&[1.0, 1.0, 1.0], None, 8);
        assert_eq!(spectrum.len(), 8);
        // DC bin is the plain sum regardless of padding
        assert!((spectrum[0].re - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bin_frequency() {
        assert!((bin_frequency(5, 100, 1000.0) - 50.0).abs() < 1e-12);
    }
}
