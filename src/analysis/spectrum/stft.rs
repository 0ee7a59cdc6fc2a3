// STFT module - short-time magnitude spectrogram
//
// Layout:
// - half a segment of zeros added to both ends, so the first frame is
//   centred on t = 0
// - trailing zeros so the extended signal holds a whole number of hops
// - each segment windowed (periodic window), zero-padded to `fft_length`
// - magnitude scaled by 1 / Σwindow, one-sided (fft_length / 2 + 1 bins)
// - stored time-major: magnitude[frame][bin]

use serde::{Deserialize, Serialize};

use super::fft::{bin_frequency, FftProcessor};
use crate::config::StftConfig;

/// Time-frequency magnitude tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    /// Segment centre times in seconds
    pub times: Vec<f64>,
    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,
    /// `magnitude[frame][bin]`
    pub magnitude: Vec<Vec<f64>>,
}

impl Spectrogram {
    /// Remove bins at or below 0 Hz from every frame
    pub fn drop_non_positive_frequencies(&mut self) {
        let skip = self.frequencies.iter().take_while(|&&f| f <= 0.0).count();
        if skip == 0 {
            return;
        }
        self.frequencies.drain(..skip);
        for frame in &mut self.magnitude {
            frame.drain(..skip.min(frame.len()));
        }
    }

    pub fn frame_count(&self) -> usize {
        self.times.len()
    }
}

/// Resolved segment geometry for a given series length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    segment: usize,
    hop: usize,
    fft_length: usize,
}

impl Geometry {
    fn resolve(config: &StftConfig, samples: usize) -> Self {
        let segment = config.segment_length.max(1).min(samples.max(1));
        let overlap = config
            .overlap
            .unwrap_or(segment / 2)
            .min(segment.saturating_sub(1));
        let fft_length = config.fft_length.unwrap_or(2 * segment).max(segment);
        Self {
            segment,
            hop: segment - overlap,
            fft_length,
        }
    }
}

/// Compute the spectrogram of `values` sampled at `sampling_hz`
pub fn compute_stft(
    values: &[f64],
    sampling_hz: f64,
    config: &StftConfig,
    fft_processor: &FftProcessor,
) -> Spectrogram {
    let geometry = Geometry::resolve(config, values.len());
    if geometry.segment < config.segment_length {
        log::debug!(
            "[STFT] Segment length {} exceeds {} samples, using {}",
            config.segment_length,
            values.len(),
            geometry.segment
        );
    }

    let Geometry {
        segment,
        hop,
        fft_length,
    } = geometry;
    let half = segment / 2;

    let mut extended = vec![0.0; half];
    extended.extend_from_slice(values);
    extended.resize(extended.len() + half, 0.0);
    let remainder = (extended.len() - segment) % hop;
    if remainder != 0 {
        extended.resize(extended.len() + hop - remainder, 0.0);
    }

    let window = config.window.periodic(segment);
    let window_sum: f64 = window.iter().sum();
    let scale = if window_sum > 0.0 { 1.0 / window_sum } else { 1.0 };

    let frames = (extended.len() - segment) / hop + 1;
    let bins = fft_length / 2 + 1;

    // Frame i starts `half` samples before original sample i·hop
    let times = (0..frames)
        .map(|i| (i * hop) as f64 / sampling_hz)
        .collect();
    let frequencies = (0..bins)
        .map(|k| bin_frequency(k, fft_length, sampling_hz))
        .collect();
    let magnitude = (0..frames)
        .map(|i| {
            let start = i * hop;
            fft_processor
                .compute_magnitude_spectrum(
                    &extended[start..start + segment],
                    Some(&window),
                    fft_length,
                    bins,
                )
                .into_iter()
                .map(|m| m * scale)
                .collect()
        })
        .collect();

    Spectrogram {
        times,
        frequencies,
        magnitude,
    }
}
