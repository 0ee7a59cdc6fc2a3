//! Configuration management for analysis parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on peak-exclusion counts, spectral options and
//! filter settings without recompilation. Every field has a default, so a
//! config file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::series::SamplingEstimate;
use crate::analysis::spectrum::{FrequencyScale, MagnitudeScale, WindowKind};

/// Complete analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub peaks: PeakDetectionConfig,
    pub spectrum: SpectrumConfig,
    pub filter: FilterConfig,
}

/// Dynamic peak detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectionConfig {
    /// Candidates discarded right after the highest peak (transient regime)
    pub exclude_after_max: usize,
    /// Trailing candidates discarded (noise floor)
    pub exclude_last_n: usize,
    /// Prominence threshold as a fraction of the signal standard deviation
    pub min_prominence_factor: f64,
    /// Height threshold as a fraction of the signal maximum
    pub min_height_factor: f64,
    /// Minimum inter-peak distance in samples; derived from the dominant
    /// frequency when absent
    pub min_distance: Option<usize>,
    /// Sample spacing used to turn the dominant period into samples
    pub sampling: SamplingEstimate,
}

impl Default for PeakDetectionConfig {
    fn default() -> Self {
        Self {
            exclude_after_max: 3,
            exclude_last_n: 3,
            min_prominence_factor: 0.1,
            min_height_factor: 0.1,
            min_distance: None,
            sampling: SamplingEstimate::FirstInterval,
        }
    }
}

/// Butterworth low-pass parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub cutoff_hz: f64,
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: 200.0,
            order: 2,
        }
    }
}

/// Optional low-pass smoothing of the magnitude spectrum before peak picking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    pub cutoff_hz: f64,
    #[serde(default = "default_smoothing_order")]
    pub order: usize,
    /// Report the smoothed spectrum as the result of record
    #[serde(default)]
    pub replace_spectrum: bool,
}

fn default_smoothing_order() -> usize {
    2
}

impl SmoothingConfig {
    pub fn new(cutoff_hz: f64) -> Self {
        Self {
            cutoff_hz,
            order: default_smoothing_order(),
            replace_spectrum: false,
        }
    }
}

/// Short-time Fourier transform parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StftConfig {
    /// Samples per segment
    pub segment_length: usize,
    /// Overlapping samples between segments (half a segment when absent)
    pub overlap: Option<usize>,
    /// Transform length per segment (twice the segment when absent)
    pub fft_length: Option<usize>,
    pub window: WindowKind,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            segment_length: 2048,
            overlap: None,
            fft_length: None,
            window: WindowKind::Hann,
        }
    }
}

/// Full-spectrum and spectrogram parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub window: Option<WindowKind>,
    /// Target transform length; ignored when not longer than the series
    pub zero_pad_to: Option<usize>,
    pub magnitude_scale: MagnitudeScale,
    pub frequency_scale: FrequencyScale,
    pub sampling: SamplingEstimate,
    /// Minimum linear magnitude of annotated spectral peaks; no annotation when absent
    pub peak_threshold: Option<f64>,
    pub smoothing: Option<SmoothingConfig>,
    pub stft: StftConfig,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            window: None,
            zero_pad_to: None,
            magnitude_scale: MagnitudeScale::Linear,
            frequency_scale: FrequencyScale::Log,
            sampling: SamplingEstimate::MeanInterval,
            peak_threshold: Some(0.005),
            smoothing: None,
            stft: StftConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults when the file is missing
    /// or its JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Self {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::default(),
        }
    }
}
