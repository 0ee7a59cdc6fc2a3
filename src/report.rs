//! Serializable summaries of pipeline results.
//!
//! Reports flatten the analysis types into plain JSON-friendly records.
//! A failed branch is written as its error code and message so that a
//! report always exists, even when only part of the analysis succeeded.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::decay::DecayFitResult;
use crate::analysis::peaks::PeakSet;
use crate::analysis::spectrum::{SpectralPeak, Spectrogram, SpectrumResult};
use crate::analysis::{DampingAnalysis, PipelineReport};
use crate::error::{AnalysisError, ErrorCode};

/// Decay fit plus the peaks it was fitted to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DampingSummary {
    pub a0: f64,
    pub beta: f64,
    pub damping_ratio: f64,
    pub r_squared: f64,
    pub omega_d: Option<f64>,
    pub peak_count: usize,
    pub peak_times: Vec<f64>,
    pub peak_values: Vec<f64>,
}

impl DampingSummary {
    pub fn new(peaks: &PeakSet, fit: &DecayFitResult) -> Self {
        Self {
            a0: fit.a0,
            beta: fit.beta,
            damping_ratio: fit.damping_ratio,
            r_squared: fit.r_squared,
            omega_d: fit.omega_d,
            peak_count: peaks.len(),
            peak_times: peaks.times().to_vec(),
            peak_values: peaks.values().to_vec(),
        }
    }
}

impl From<&DampingAnalysis> for DampingSummary {
    fn from(analysis: &DampingAnalysis) -> Self {
        DampingSummary::new(&analysis.peaks, &analysis.fit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumSummary {
    pub sampling_hz: f64,
    pub frequencies: Vec<f64>,
    pub magnitude: Vec<f64>,
    pub smoothed: Option<Vec<f64>>,
    pub peaks: Vec<SpectralPeak>,
    pub stft: Spectrogram,
}

impl From<&SpectrumResult> for SpectrumSummary {
    fn from(result: &SpectrumResult) -> Self {
        Self {
            sampling_hz: result.sampling_hz,
            frequencies: result.frequencies.clone(),
            magnitude: result.magnitude.clone(),
            smoothed: result.smoothed.clone(),
            peaks: result.peaks.clone(),
            stft: result.stft.clone(),
        }
    }
}

/// Error record written in place of a failed branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub code: i32,
    pub message: String,
}

impl From<&AnalysisError> for FailureRecord {
    fn from(err: &AnalysisError) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
        }
    }
}

/// One branch of a report: its summary, or why it is missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOutcome<T> {
    Ok(T),
    Failed(FailureRecord),
}

impl<T> BranchOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, BranchOutcome::Ok(_))
    }
}

impl<'a, S, T> From<&'a Result<S, AnalysisError>> for BranchOutcome<T>
where
    T: From<&'a S>,
{
    fn from(result: &'a Result<S, AnalysisError>) -> Self {
        match result {
            Ok(value) => BranchOutcome::Ok(T::from(value)),
            Err(err) => BranchOutcome::Failed(FailureRecord::from(err)),
        }
    }
}

/// Filtered-series branch: where the copy was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredSummary {
    pub samples: usize,
    pub path: Option<String>,
}

/// Report of a full pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub samples: usize,
    pub damping: BranchOutcome<DampingSummary>,
    pub spectrum: BranchOutcome<SpectrumSummary>,
    pub filtered: BranchOutcome<FilteredSummary>,
}

impl PipelineSummary {
    /// Summarize `report`; `filtered_path` names where the filtered copy went
    pub fn new(samples: usize, report: &PipelineReport, filtered_path: Option<&Path>) -> Self {
        let filtered = match &report.filtered {
            Ok(series) => BranchOutcome::Ok(FilteredSummary {
                samples: series.len(),
                path: filtered_path.map(|p| p.display().to_string()),
            }),
            Err(err) => BranchOutcome::Failed(FailureRecord::from(err)),
        };

        Self {
            samples,
            damping: BranchOutcome::from(&report.damping),
            spectrum: BranchOutcome::from(&report.spectrum),
            filtered,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.damping.is_ok() && self.spectrum.is_ok() && self.filtered.is_ok()
    }
}

/// Write any report as pretty JSON
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    log::info!("[Report] Wrote {}", path.display());
    Ok(())
}
