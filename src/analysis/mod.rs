// Analysis module - post-acquisition vibration analysis pipeline
//
// Every stage is a pure function of an owned TimeSeries snapshot and a
// configuration value; none of them mutate their inputs.
//
// Branches run independently on the same series:
// - Damping: FrequencyEstimator → DynamicPeakDetector → DecayFitter
// - Spectrum: SpectralAnalyzer (full FFT + STFT)
// - Filtered copy: Butterworth low-pass (FilterStage)
//
// A failure in one branch is logged and reported, never propagated to
// the other two.

pub mod decay;
pub mod filter;
pub mod frequency;
pub mod peaks;
pub mod series;
pub mod spectrum;

use decay::{fit_exponential_decay, DecayFitResult};
use filter::filter_series;
use peaks::{DynamicPeakDetector, PeakSet};
use series::{SamplingEstimate, TimeSeries};
use spectrum::{SpectralAnalyzer, SpectrumResult};

use crate::config::AnalysisConfig;
use crate::error::{log_analysis_error, AnalysisError};

/// Outcome of the damping branch: the peaks that were fitted plus the fit
#[derive(Debug, Clone, PartialEq)]
pub struct DampingAnalysis {
    pub peaks: PeakSet,
    pub fit: DecayFitResult,
}

/// Outcomes of the three independent pipeline branches
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub damping: Result<DampingAnalysis, AnalysisError>,
    pub spectrum: Result<SpectrumResult, AnalysisError>,
    pub filtered: Result<TimeSeries, AnalysisError>,
}

impl PipelineReport {
    /// True when every branch produced its artifact
    pub fn is_complete(&self) -> bool {
        self.damping.is_ok() && self.spectrum.is_ok() && self.filtered.is_ok()
    }

    /// Errors of the failed branches, in branch order
    pub fn failures(&self) -> Vec<&AnalysisError> {
        [
            self.damping.as_ref().err(),
            self.spectrum.as_ref().err(),
            self.filtered.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Detect decaying peaks and fit the exponential envelope
pub fn analyze_damping(
    series: &TimeSeries,
    config: &AnalysisConfig,
) -> Result<DampingAnalysis, AnalysisError> {
    let peaks = DynamicPeakDetector::new(config.peaks.clone()).detect(series)?;
    let fit = fit_exponential_decay(&peaks)?;
    Ok(DampingAnalysis { peaks, fit })
}

/// Run all branches on `series`
pub fn run_pipeline(series: &TimeSeries, config: &AnalysisConfig) -> PipelineReport {
    let span = tracing::info_span!("pipeline", samples = series.len());
    let _guard = span.enter();

    let damping = analyze_damping(series, config);
    match &damping {
        Ok(analysis) => tracing::info!(
            peaks = analysis.peaks.len(),
            beta = analysis.fit.beta,
            zeta = analysis.fit.damping_ratio,
            r_squared = analysis.fit.r_squared,
            "damping branch finished"
        ),
        Err(err) => log_analysis_error(err, "damping branch"),
    }

    let spectrum = SpectralAnalyzer::new(config.spectrum.clone()).analyze(series);
    match &spectrum {
        Ok(result) => tracing::info!(
            bins = result.frequencies.len(),
            peaks = result.peaks.len(),
            "spectrum branch finished"
        ),
        Err(err) => log_analysis_error(err, "spectrum branch"),
    }

    let filtered = filter_series(series, &config.filter, SamplingEstimate::MeanInterval);
    match &filtered {
        Ok(_) => tracing::info!(cutoff_hz = config.filter.cutoff_hz, "filter branch finished"),
        Err(err) => log_analysis_error(err, "filter branch"),
    }

    PipelineReport {
        damping,
        spectrum,
        filtered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use std::f64::consts::PI;

    fn damped_sine(sample_rate: f64, samples: usize) -> TimeSeries {
        let values = (0..samples)
            .map(|i| {
                let t = i as f64 / sample_rate;
                2.0 * (-0.8 * t).exp() * (2.0 * PI * 12.0 * t).sin()
            })
            .collect();
        TimeSeries::from_uniform(sample_rate, values).unwrap()
    }

    fn small_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.spectrum.stft.segment_length = 256;
        config
    }

    #[test]
    fn test_all_branches_succeed() {
        let series = damped_sine(1000.0, 3000);
        let report = run_pipeline(&series, &small_config());

        assert!(report.is_complete());
        assert!(report.failures().is_empty());

        let damping = report.damping.unwrap();
        assert!((damping.fit.beta - 0.8).abs() < 0.05, "beta {}", damping.fit.beta);
        assert!(damping.fit.r_squared > 0.99);

        let filtered = report.filtered.unwrap();
        assert_eq!(filtered.timestamps(), series.timestamps());
    }

    #[test]
    fn test_filter_failure_does_not_block_other_branches() {
        let mut config = small_config();
        config.filter = FilterConfig {
            cutoff_hz: 600.0,
            order: 2,
        };
        let report = run_pipeline(&damped_sine(1000.0, 3000), &config);

        assert!(report.damping.is_ok());
        assert!(report.spectrum.is_ok());
        assert!(matches!(
            report.filtered,
            Err(AnalysisError::InvalidFilterParams { .. })
        ));
        assert_eq!(report.failures().len(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_damping_failure_is_isolated() {
        // Pure noise-free DC ramp has no interior maxima
        let values = (0..500).map(|i| i as f64 * 0.01).collect();
        let series = TimeSeries::from_uniform(500.0, values).unwrap();
        let report = run_pipeline(&series, &small_config());

        assert!(matches!(
            report.damping,
            Err(AnalysisError::InsufficientPeaks { .. })
        ));
        assert!(report.spectrum.is_ok());
        assert!(report.filtered.is_ok());
    }
}
