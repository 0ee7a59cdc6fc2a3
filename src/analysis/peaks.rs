// Peaks module - dynamic peak detection tuned to the excitation frequency
//
// Algorithm:
// 1. Estimate the dominant frequency and convert its period into a
//    minimum inter-peak distance in samples (unless overridden)
// 2. Thresholds: prominence = factor × std(values), height = factor × max(values)
// 3. Local maxima (plateaus report their middle sample, boundaries never count)
// 4. Keep maxima at or above the height threshold
// 5. Distance filter: higher peaks claim their neighbourhood first
// 6. Keep maxima whose prominence reaches the prominence threshold
// 7. Policy trim: drop everything up to and including the highest peak and
//    the next `exclude_after_max` candidates, then the last `exclude_last_n`
//    when more than that many remain

use statrs::statistics::Statistics;

use crate::analysis::frequency::FrequencyEstimator;
use crate::analysis::series::TimeSeries;
use crate::config::PeakDetectionConfig;
use crate::error::AnalysisError;

/// Minimum peaks required for a decay fit
pub const MIN_FIT_PEAKS: usize = 2;

/// Index-aligned subset of a series' local maxima, ordered by time
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSet {
    indices: Vec<usize>,
    times: Vec<f64>,
    values: Vec<f64>,
}

impl PeakSet {
    /// Peaks at the given (increasing) sample indices of `series`
    pub fn from_series(series: &TimeSeries, indices: &[usize]) -> Self {
        Self {
            indices: indices.to_vec(),
            times: indices.iter().map(|&i| series.timestamps()[i]).collect(),
            values: indices.iter().map(|&i| series.values()[i]).collect(),
        }
    }

    /// Peaks given directly as points; indices refer to the point list itself
    pub fn from_points(times: Vec<f64>, values: Vec<f64>) -> Result<Self, AnalysisError> {
        if times.len() != values.len() {
            return Err(AnalysisError::invalid_input(format!(
                "peak times ({}) and values ({}) differ in length",
                times.len(),
                values.len()
            )));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::invalid_input(
                "peak times must be strictly increasing",
            ));
        }
        if times.iter().chain(values.iter()).any(|v| !v.is_finite()) {
            return Err(AnalysisError::invalid_input("peak contains a non-finite value"));
        }
        Ok(Self {
            indices: (0..times.len()).collect(),
            times,
            values,
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Thresholds derived from a series before extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakThresholds {
    pub min_distance: usize,
    pub min_prominence: f64,
    pub min_height: f64,
}

/// Peak detector whose spacing adapts to the signal's dominant frequency
pub struct DynamicPeakDetector {
    config: PeakDetectionConfig,
    estimator: FrequencyEstimator,
}

impl DynamicPeakDetector {
    pub fn new(config: PeakDetectionConfig) -> Self {
        let estimator = FrequencyEstimator::with_sampling(config.sampling);
        Self { config, estimator }
    }

    pub fn config(&self) -> &PeakDetectionConfig {
        &self.config
    }

    /// Minimum distance in samples between retained peaks
    pub fn min_distance(&self, series: &TimeSeries) -> usize {
        if let Some(distance) = self.config.min_distance {
            return distance.max(1);
        }

        let dominant = self.estimator.estimate(series);
        if !(dominant.is_finite() && dominant > 0.0) {
            log::warn!(
                "[PeakDetector] Dominant frequency {} Hz has no period, using min_distance=1",
                dominant
            );
            return 1;
        }

        let dt = 1.0 / series.sampling_rate(self.config.sampling);
        let expected_period = 1.0 / dominant;
        ((expected_period / dt).floor() as usize).max(1)
    }

    /// Absolute thresholds for `series`
    pub fn thresholds(&self, series: &TimeSeries) -> PeakThresholds {
        let values = series.values();
        let std_dev = values.iter().population_std_dev();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        PeakThresholds {
            min_distance: self.min_distance(series),
            min_prominence: self.config.min_prominence_factor * std_dev,
            min_height: self.config.min_height_factor * max,
        }
    }

    /// Every local maximum that satisfies distance, prominence and height
    ///
    /// No policy trimming is applied.
    pub fn candidates(&self, series: &TimeSeries) -> Vec<usize> {
        let thresholds = self.thresholds(series);
        let candidates = find_peaks(series.values(), &thresholds);
        log::debug!(
            "[PeakDetector] {} candidates (min_distance={}, prominence>={:.5}, height>={:.5})",
            candidates.len(),
            thresholds.min_distance,
            thresholds.min_prominence,
            thresholds.min_height
        );
        candidates
    }

    /// Candidates trimmed by the transient/noise-floor exclusion policy
    pub fn detect(&self, series: &TimeSeries) -> Result<PeakSet, AnalysisError> {
        let candidates = self.candidates(series);
        if candidates.is_empty() {
            return Err(AnalysisError::InsufficientPeaks {
                required: MIN_FIT_PEAKS,
                found: 0,
            });
        }

        let values = series.values();
        // First occurrence wins on equal amplitudes
        let mut highest = 0;
        for (pos, &idx) in candidates.iter().enumerate() {
            if values[idx] > values[candidates[highest]] {
                highest = pos;
            }
        }

        let start = highest
            .saturating_add(1)
            .saturating_add(self.config.exclude_after_max)
            .min(candidates.len());
        let after_max = &candidates[start..];
        // The tail trim is skipped when it would consume every remaining candidate
        let end = if after_max.len() > self.config.exclude_last_n {
            after_max.len() - self.config.exclude_last_n
        } else {
            after_max.len()
        };
        let retained = &after_max[..end];

        log::info!(
            "[PeakDetector] Highest peak at sample {}, {} of {} candidates retained",
            candidates[highest],
            retained.len(),
            candidates.len()
        );

        if retained.len() < MIN_FIT_PEAKS {
            return Err(AnalysisError::InsufficientPeaks {
                required: MIN_FIT_PEAKS,
                found: retained.len(),
            });
        }

        Ok(PeakSet::from_series(series, retained))
    }
}

/// Detect peaks in `series` with the given configuration
pub fn detect_peaks(
    series: &TimeSeries,
    config: &PeakDetectionConfig,
) -> Result<PeakSet, AnalysisError> {
    DynamicPeakDetector::new(config.clone()).detect(series)
}

/// Local maxima filtered by height, then distance, then prominence
pub fn find_peaks(x: &[f64], thresholds: &PeakThresholds) -> Vec<usize> {
    let peaks: Vec<usize> = local_maxima(x)
        .into_iter()
        .filter(|&p| x[p] >= thresholds.min_height)
        .collect();
    let peaks = select_by_distance(x, &peaks, thresholds.min_distance);
    peaks
        .into_iter()
        .filter(|&p| prominence(x, p) >= thresholds.min_prominence)
        .collect()
}

/// Indices of local maxima, plateaus reported at their middle sample
///
/// The first and last samples are never maxima; a plateau touching the
/// end of the signal is not one either.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                peaks.push((i + i_ahead - 1) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a higher peak
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Height of a peak above the higher of its two surrounding minima
///
/// Each minimum is searched between the peak and the nearest strictly
/// higher sample (or the signal boundary) on that side.
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if x[i] > height {
            break;
        }
        left_min = left_min.min(x[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &value in &x[peak..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }

    height - left_min.max(right_min)
}
