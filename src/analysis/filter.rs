// Filter module - zero-phase Butterworth low-pass
//
// Design: analog Butterworth prototype poles, pre-warped cutoff, bilinear
// transform into second-order sections (plus one first-order section for
// odd orders). Each section has unity DC gain.
//
// Application: odd extension of both edges, forward pass, reverse,
// backward pass, reverse, trim. Every section starts from its steady
// state for the first padded sample so the edges do not ring.

use std::f64::consts::PI;

use crate::analysis::series::{SamplingEstimate, TimeSeries};
use crate::config::FilterConfig;
use crate::error::AnalysisError;

/// One biquad `[b0, b1, b2] / [1, a1, a2]`, Direct Form II Transposed
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Filter `data` in place starting from the steady state for input `x0`
    fn apply(&self, data: &mut [f64], x0: f64) {
        let y0 = self.dc_gain() * x0;
        // Steady state: d2 = b2·x0 - a2·y0, d1 = b1·x0 - a1·y0 + d2
        let mut d2 = self.b2 * x0 - self.a2 * y0;
        let mut d1 = self.b1 * x0 - self.a1 * y0 + d2;

        for sample in data.iter_mut() {
            let x = *sample;
            let y = self.b0 * x + d1;
            d1 = self.b1 * x - self.a1 * y + d2;
            d2 = self.b2 * x - self.a2 * y;
            *sample = y;
        }
    }

    fn response(&self, omega: f64) -> f64 {
        // |H(e^{jω})| evaluated directly from the coefficients
        let (c1, s1) = (omega.cos(), omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), (2.0 * omega).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

/// Digital Butterworth low-pass designed for a given sampling rate
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthLowPass {
    sections: Vec<Section>,
    order: usize,
    cutoff_hz: f64,
    sampling_hz: f64,
}

impl ButterworthLowPass {
    /// Design the filter
    ///
    /// Fails when `order` is 0, the cutoff is not positive, or the cutoff
    /// is at or above the Nyquist frequency.
    pub fn design(cutoff_hz: f64, sampling_hz: f64, order: usize) -> Result<Self, AnalysisError> {
        let valid = order > 0
            && cutoff_hz.is_finite()
            && sampling_hz.is_finite()
            && cutoff_hz > 0.0
            && sampling_hz > 0.0
            && cutoff_hz < sampling_hz / 2.0;
        if !valid {
            return Err(AnalysisError::InvalidFilterParams {
                cutoff_hz,
                sampling_hz,
                order,
            });
        }

        // Pre-warped analog cutoff for s = (1 - z^-1) / (1 + z^-1)
        let wc = (PI * cutoff_hz / sampling_hz).tan();
        let wc2 = wc * wc;
        let mut sections = Vec::with_capacity(order / 2 + 1);

        for k in 0..order / 2 {
            // Conjugate pole pair: s² + q·wc·s + wc²
            let q = 2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin();
            let a0 = 1.0 + q * wc + wc2;
            sections.push(Section {
                b0: wc2 / a0,
                b1: 2.0 * wc2 / a0,
                b2: wc2 / a0,
                a1: (2.0 * wc2 - 2.0) / a0,
                a2: (1.0 - q * wc + wc2) / a0,
            });
        }

        if order % 2 == 1 {
            // Real pole: wc / (s + wc)
            let a0 = 1.0 + wc;
            sections.push(Section {
                b0: wc / a0,
                b1: wc / a0,
                b2: 0.0,
                a1: (wc - 1.0) / a0,
                a2: 0.0,
            });
        }

        Ok(Self {
            sections,
            order,
            cutoff_hz,
            sampling_hz,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    /// Single-pass magnitude response at `frequency_hz`
    pub fn magnitude_response(&self, frequency_hz: f64) -> f64 {
        let omega = 2.0 * PI * frequency_hz / self.sampling_hz;
        self.sections.iter().map(|s| s.response(omega)).product()
    }

    /// Samples of odd extension added to each edge
    fn pad_len(&self, len: usize) -> usize {
        (3 * (self.order + 1)).min(len.saturating_sub(1))
    }

    fn run_cascade(&self, data: &mut [f64]) {
        let mut level = match data.first() {
            Some(&x0) => x0,
            None => return,
        };
        for section in &self.sections {
            section.apply(data, level);
            level *= section.dc_gain();
        }
    }

    /// Zero-phase (forward-backward) filtering
    pub fn filtfilt(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n < 2 {
            return values.to_vec();
        }

        let pad = self.pad_len(n);
        let first = values[0];
        let last = values[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - values[i]));
        extended.extend_from_slice(values);
        extended.extend((1..=pad).map(|i| 2.0 * last - values[n - 1 - i]));

        self.run_cascade(&mut extended);
        extended.reverse();
        self.run_cascade(&mut extended);
        extended.reverse();

        extended[pad..pad + n].to_vec()
    }
}

/// Zero-phase Butterworth low-pass of `values` sampled at `sampling_hz`
pub fn low_pass(
    values: &[f64],
    cutoff_hz: f64,
    sampling_hz: f64,
    order: usize,
) -> Result<Vec<f64>, AnalysisError> {
    let filter = ButterworthLowPass::design(cutoff_hz, sampling_hz, order)?;
    Ok(filter.filtfilt(values))
}

/// Filtered copy of `series`, same timestamps
pub fn filter_series(
    series: &TimeSeries,
    config: &FilterConfig,
    sampling: SamplingEstimate,
) -> Result<TimeSeries, AnalysisError> {
    let sampling_hz = series.sampling_rate(sampling);
    log::info!(
        "[FilterStage] Low-pass {} Hz, order {}, at {:.2} Hz",
        config.cutoff_hz,
        config.order,
        sampling_hz
    );
    let filtered = low_pass(series.values(), config.cutoff_hz, sampling_hz, config.order)?;
    series.with_values(filtered)
}
