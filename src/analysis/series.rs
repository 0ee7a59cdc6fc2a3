// Series module - validated (timestamp, amplitude) input data
//
// A TimeSeries is the only data contract between acquisition/storage and
// the analysis core. It is immutable once constructed; every analysis call
// borrows it.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Minimum number of samples any analysis stage accepts
pub const MIN_SAMPLES: usize = 2;

/// How a sampling rate is derived from a series' timestamps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingEstimate {
    /// `1 / (t[1] - t[0])`
    FirstInterval,
    /// `1 / mean(diff(t))`
    MeanInterval,
    /// `(N - K) / t[N - K - 1]`, kept for parity with legacy recordings
    /// whose clock starts at zero
    Lookback { samples: usize },
}

impl Default for SamplingEstimate {
    fn default() -> Self {
        SamplingEstimate::MeanInterval
    }
}

/// Ordered, equal-length timestamps (seconds) and amplitudes
///
/// Invariants: at least [`MIN_SAMPLES`] samples, timestamps strictly
/// increasing, every value finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct TimeSeries {
    timestamps: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, validating every invariant
    pub fn new(timestamps: Vec<f64>, values: Vec<f64>) -> Result<Self, AnalysisError> {
        if timestamps.len() != values.len() {
            return Err(AnalysisError::invalid_input(format!(
                "timestamps ({}) and values ({}) differ in length",
                timestamps.len(),
                values.len()
            )));
        }
        if timestamps.len() < MIN_SAMPLES {
            return Err(AnalysisError::invalid_input(format!(
                "need at least {} samples, got {}",
                MIN_SAMPLES,
                timestamps.len()
            )));
        }
        if let Some(idx) = timestamps
            .iter()
            .chain(values.iter())
            .position(|v| !v.is_finite())
        {
            return Err(AnalysisError::invalid_input(format!(
                "non-finite sample at position {}",
                idx % timestamps.len()
            )));
        }
        if let Some(idx) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(AnalysisError::invalid_input(format!(
                "timestamps not strictly increasing at index {}",
                idx + 1
            )));
        }

        Ok(Self { timestamps, values })
    }

    /// Build a uniformly sampled series starting at t = 0
    pub fn from_uniform(sample_rate: f64, values: Vec<f64>) -> Result<Self, AnalysisError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AnalysisError::invalid_input(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        let timestamps = (0..values.len())
            .map(|i| i as f64 / sample_rate)
            .collect();
        Self::new(timestamps, values)
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed series; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Spacing of the first two samples, the legacy proxy for `dt`
    ///
    /// Global uniformity is not checked. Series with jittery clocks get a
    /// `dt` that only describes their start.
    pub fn first_interval(&self) -> f64 {
        self.timestamps[1] - self.timestamps[0]
    }

    /// Mean spacing over the whole series
    pub fn mean_interval(&self) -> f64 {
        let n = self.timestamps.len();
        (self.timestamps[n - 1] - self.timestamps[0]) / (n - 1) as f64
    }

    /// Total covered time span in seconds
    pub fn duration(&self) -> f64 {
        self.timestamps[self.timestamps.len() - 1] - self.timestamps[0]
    }

    /// Sampling rate in Hz according to the requested estimate
    pub fn sampling_rate(&self, estimate: SamplingEstimate) -> f64 {
        match estimate {
            SamplingEstimate::FirstInterval => 1.0 / self.first_interval(),
            SamplingEstimate::MeanInterval => 1.0 / self.mean_interval(),
            SamplingEstimate::Lookback { samples } => {
                let n = self.len();
                if n > samples + 1 {
                    let reference = self.timestamps[n - samples - 1];
                    if reference > 0.0 {
                        return (n - samples) as f64 / reference;
                    }
                }
                log::debug!(
                    "[TimeSeries] Lookback of {} samples unusable for {} samples, using mean interval",
                    samples,
                    n
                );
                1.0 / self.mean_interval()
            }
        }
    }

    /// Copy of this series with the same timestamps and new values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self, AnalysisError> {
        Self::new(self.timestamps.clone(), values)
    }

    /// Consume into the raw `(timestamps, values)` pair
    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.timestamps, self.values)
    }
}

impl TryFrom<Vec<Vec<f64>>> for TimeSeries {
    type Error = AnalysisError;

    /// Accept the persisted two-row table `[timestamps, values]`
    fn try_from(mut rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        if rows.len() != 2 {
            return Err(AnalysisError::invalid_input(format!(
                "expected 2 rows [timestamps, values], got {}",
                rows.len()
            )));
        }
        let values = rows.pop().unwrap_or_default();
        let timestamps = rows.pop().unwrap_or_default();
        Self::new(timestamps, values)
    }
}

impl From<TimeSeries> for Vec<Vec<f64>> {
    fn from(series: TimeSeries) -> Self {
        let (timestamps, values) = series.into_parts();
        vec![timestamps, values]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_series() {
        let err = TimeSeries::new(vec![0.0], vec![1.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(TimeSeries::new(vec![0.0, 1.0, 2.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_timestamps() {
        let err = TimeSeries::new(vec![0.0, 0.2, 0.2], vec![1.0, 2.0, 3.0]).unwrap_err();
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        assert!(TimeSeries::new(vec![0.0, 1.0], vec![f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_sampling_estimates() {
        // Irregular clock: first gap 0.1, mean gap 0.2
        let series = TimeSeries::new(vec![0.0, 0.1, 0.4, 0.6], vec![0.0; 4]).unwrap();
        assert!((series.sampling_rate(SamplingEstimate::FirstInterval) - 10.0).abs() < 1e-9);
        assert!((series.sampling_rate(SamplingEstimate::MeanInterval) - 5.0).abs() < 1e-9);
        // (4 - 1) / t[2]
        assert!(
            (series.sampling_rate(SamplingEstimate::Lookback { samples: 1 }) - 7.5).abs() < 1e-9
        );
        // Lookback longer than the series falls back to the mean interval
        assert!(
            (series.sampling_rate(SamplingEstimate::Lookback { samples: 2000 }) - 5.0).abs()
                < 1e-9
        );
    }

    #[test]
    fn test_two_row_json_shape() {
        let series = TimeSeries::from_uniform(2.0, vec![1.0, 2.0, 3.0]).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, "[[0.0,0.5,1.0],[1.0,2.0,3.0]]");

        let parsed: TimeSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, series);
        assert!(serde_json::from_str::<TimeSeries>("[[0.0,1.0]]").is_err());
    }
}
