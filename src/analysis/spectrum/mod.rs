// Spectrum module - full-length FFT and STFT of a series
//
// Module organization:
// - fft: FFT computation with optional window and zero-padding
// - window: Tapering windows (symmetric and periodic forms)
// - stft: Short-time magnitude spectrogram
// - mod.rs: Coordinator (SpectralAnalyzer)
//
// Pipeline:
// 1. Sampling rate from the timestamps (mean interval by default)
// 2. Optional window, optional zero-padding to a longer transform
// 3. One-sided magnitude 2/N·|FFT| over ⌊N_fft/2⌋ bins
// 4. Optional low-pass smoothing of the magnitude array
// 5. Peak annotation on the smoothed (or raw) linear magnitude
// 6. Frequency scale: log drops every bin at or below 0 Hz
// 7. Magnitude scale: log applies log10(m + ε)

pub mod fft;
mod stft;
mod window;

pub use stft::{compute_stft, Spectrogram};
pub use window::WindowKind;

use serde::{Deserialize, Serialize};

use crate::analysis::filter::low_pass;
use crate::analysis::peaks::local_maxima;
use crate::analysis::series::TimeSeries;
use crate::config::SpectrumConfig;
use crate::error::AnalysisError;
use fft::{bin_frequency, FftProcessor};

/// Offset added before taking log10 of a magnitude
pub const LOG_EPSILON: f64 = 1e-10;

/// Magnitude axis scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeScale {
    Linear,
    Log,
}

impl MagnitudeScale {
    fn apply(self, magnitude: f64) -> f64 {
        match self {
            MagnitudeScale::Linear => magnitude,
            // Smoothed spectra may undershoot below zero
            MagnitudeScale::Log => (magnitude.max(0.0) + LOG_EPSILON).log10(),
        }
    }

    fn apply_all(self, values: &mut [f64]) {
        if self == MagnitudeScale::Log {
            values.iter_mut().for_each(|v| *v = self.apply(*v));
        }
    }
}

/// Frequency axis scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyScale {
    Linear,
    Log,
}

/// Annotated local maximum of the magnitude spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    /// Frequency in Hz
    pub frequency: f64,
    /// Magnitude in the result's magnitude scale
    pub magnitude: f64,
}

/// Full spectrum plus spectrogram of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumResult {
    pub sampling_hz: f64,
    /// Transform length after zero-padding
    pub fft_length: usize,
    pub frequencies: Vec<f64>,
    pub magnitude: Vec<f64>,
    /// Smoothed magnitude, aligned with `frequencies`
    pub smoothed: Option<Vec<f64>>,
    pub peaks: Vec<SpectralPeak>,
    pub magnitude_scale: MagnitudeScale,
    pub frequency_scale: FrequencyScale,
    pub stft: Spectrogram,
}

/// SpectralAnalyzer coordinates the full-spectrum and STFT computations
pub struct SpectralAnalyzer {
    config: SpectrumConfig,
    fft_processor: FftProcessor,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectrumConfig) -> Self {
        Self {
            config,
            fft_processor: FftProcessor::new(),
        }
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Linear one-sided spectrum: `(fft_length, frequencies, 2/N·|FFT|)`
    pub fn linear_spectrum(&self, values: &[f64], sampling_hz: f64) -> (usize, Vec<f64>, Vec<f64>) {
        let n = values.len();
        // Padding to a shorter length is a no-op, never a truncation
        let fft_length = self
            .config
            .zero_pad_to
            .filter(|&target| target > n)
            .unwrap_or(n);
        let window = self.config.window.map(|kind| kind.symmetric(n));
        let bins = fft_length / 2;

        let norm = 2.0 / n as f64;
        let magnitude = self
            .fft_processor
            .compute_magnitude_spectrum(values, window.as_deref(), fft_length, bins)
            .into_iter()
            .map(|m| m * norm)
            .collect();
        let frequencies = (0..bins)
            .map(|k| bin_frequency(k, fft_length, sampling_hz))
            .collect();

        (fft_length, frequencies, magnitude)
    }

    /// Run the full analysis on `series`
    ///
    /// Only fails when smoothing is requested with a cutoff the series'
    /// sampling rate cannot realise.
    pub fn analyze(&self, series: &TimeSeries) -> Result<SpectrumResult, AnalysisError> {
        let sampling_hz = series.sampling_rate(self.config.sampling);
        let (fft_length, mut frequencies, mut magnitude) =
            self.linear_spectrum(series.values(), sampling_hz);

        let mut smoothed = match self.config.smoothing {
            Some(smoothing) => Some(low_pass(
                &magnitude,
                smoothing.cutoff_hz,
                sampling_hz,
                smoothing.order,
            )?),
            None => None,
        };

        let mut peaks = match self.config.peak_threshold {
            Some(threshold) => {
                let source = smoothed.as_deref().unwrap_or(&magnitude);
                local_maxima(source)
                    .into_iter()
                    .filter(|&k| source[k] >= threshold)
                    .map(|k| SpectralPeak {
                        frequency: frequencies[k],
                        magnitude: source[k],
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let replace = self.config.smoothing.is_some_and(|s| s.replace_spectrum);
        if replace {
            if let Some(replacement) = smoothed.take() {
                magnitude = replacement;
            }
        }

        let mut stft = compute_stft(
            series.values(),
            sampling_hz,
            &self.config.stft,
            &self.fft_processor,
        );

        if self.config.frequency_scale == FrequencyScale::Log {
            let skip = frequencies.iter().take_while(|&&f| f <= 0.0).count();
            frequencies.drain(..skip);
            magnitude.drain(..skip);
            if let Some(values) = smoothed.as_mut() {
                values.drain(..skip);
            }
            peaks.retain(|p: &SpectralPeak| p.frequency > 0.0);
            stft.drop_non_positive_frequencies();
        }

        let scale = self.config.magnitude_scale;
        scale.apply_all(&mut magnitude);
        if let Some(values) = smoothed.as_mut() {
            scale.apply_all(values);
        }
        for peak in &mut peaks {
            peak.magnitude = scale.apply(peak.magnitude);
        }
        for frame in &mut stft.magnitude {
            scale.apply_all(frame);
        }

        log::info!(
            "[SpectralAnalyzer] {} samples at {:.2} Hz, {} bins, {} peaks, {} STFT frames",
            series.len(),
            sampling_hz,
            frequencies.len(),
            peaks.len(),
            stft.frame_count()
        );

        Ok(SpectrumResult {
            sampling_hz,
            fft_length,
            frequencies,
            magnitude,
            smoothed,
            peaks,
            magnitude_scale: scale,
            frequency_scale: self.config.frequency_scale,
            stft,
        })
    }
}

/// Analyze `series` with the given configuration
pub fn analyze_spectrum(
    series: &TimeSeries,
    config: &SpectrumConfig,
) -> Result<SpectrumResult, AnalysisError> {
    SpectralAnalyzer::new(config.clone()).analyze(series)
}
