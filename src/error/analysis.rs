// Analysis error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Analysis error code constants
///
/// Single source of truth for the codes written into analysis reports.
///
/// Error code range: 3001-3005
pub struct AnalysisErrorCodes {}

impl AnalysisErrorCodes {
    /// Malformed or too-short time series
    pub const INVALID_INPUT: i32 = 3001;

    /// Fewer than two usable peaks after filtering
    pub const INSUFFICIENT_PEAKS: i32 = 3002;

    /// Nonlinear least squares did not converge
    pub const FIT_CONVERGENCE: i32 = 3003;

    /// Fitted decay rate outside the underdamped regime
    pub const INVALID_DAMPING_REGIME: i32 = 3004;

    /// Filter cutoff/order not realisable at the sampling rate
    pub const INVALID_FILTER_PARAMS: i32 = 3005;
}

/// Log an analysis error with structured context
///
/// Emits the error code, the failing component and the message so that a
/// failed branch of the pipeline is visible even when the caller goes on
/// producing the remaining artifacts.
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        err.component(),
        err.message()
    );
}

/// Analysis-related errors
///
/// Deterministic numerical failures of the analysis core. None of them are
/// transient, so callers should report and skip the affected artifact
/// rather than retry.
///
/// Error code range: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Series violates the length/ordering/finiteness invariants
    InvalidInput { reason: String },

    /// Not enough peaks survived filtering to attempt a fit
    InsufficientPeaks { required: usize, found: usize },

    /// Nonlinear least squares failed from the initial guess
    FitConvergence { reason: String },

    /// |beta| >= 2π, the damping ratio formula has no real solution
    InvalidDampingRegime { beta: f64 },

    /// Cutoff at/above Nyquist, non-positive cutoff or zero order
    InvalidFilterParams {
        cutoff_hz: f64,
        sampling_hz: f64,
        order: usize,
    },
}

impl AnalysisError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        AnalysisError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Name of the pipeline component that raises this error
    pub fn component(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput { .. } => "TimeSeries",
            AnalysisError::InsufficientPeaks { .. } => "DynamicPeakDetector",
            AnalysisError::FitConvergence { .. } | AnalysisError::InvalidDampingRegime { .. } => {
                "DecayFitter"
            }
            AnalysisError::InvalidFilterParams { .. } => "FilterStage",
        }
    }
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidInput { .. } => AnalysisErrorCodes::INVALID_INPUT,
            AnalysisError::InsufficientPeaks { .. } => AnalysisErrorCodes::INSUFFICIENT_PEAKS,
            AnalysisError::FitConvergence { .. } => AnalysisErrorCodes::FIT_CONVERGENCE,
            AnalysisError::InvalidDampingRegime { .. } => {
                AnalysisErrorCodes::INVALID_DAMPING_REGIME
            }
            AnalysisError::InvalidFilterParams { .. } => AnalysisErrorCodes::INVALID_FILTER_PARAMS,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidInput { reason } => format!("Invalid input: {}", reason),
            AnalysisError::InsufficientPeaks { required, found } => {
                format!(
                    "Insufficient peaks for curve fitting: need {}, got {}",
                    required, found
                )
            }
            AnalysisError::FitConvergence { reason } => {
                format!("Exponential decay fit did not converge: {}", reason)
            }
            AnalysisError::InvalidDampingRegime { beta } => {
                format!(
                    "Decay rate beta={:.4} is outside the underdamped regime (|beta| < 2π)",
                    beta
                )
            }
            AnalysisError::InvalidFilterParams {
                cutoff_hz,
                sampling_hz,
                order,
            } => {
                format!(
                    "Invalid low-pass parameters: cutoff {} Hz, order {} at sampling rate {} Hz (Nyquist {} Hz)",
                    cutoff_hz,
                    order,
                    sampling_hz,
                    sampling_hz / 2.0
                )
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            AnalysisError::InvalidInput { .. } => "InvalidInput",
            AnalysisError::InsufficientPeaks { .. } => "InsufficientPeaks",
            AnalysisError::FitConvergence { .. } => "FitConvergence",
            AnalysisError::InvalidDampingRegime { .. } => "InvalidDampingRegime",
            AnalysisError::InvalidFilterParams { .. } => "InvalidFilterParams",
        };
        write!(
            f,
            "AnalysisError::{} (code {}): {}",
            variant,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_codes() {
        assert_eq!(
            AnalysisError::invalid_input("short").code(),
            AnalysisErrorCodes::INVALID_INPUT
        );
        assert_eq!(
            AnalysisError::InsufficientPeaks {
                required: 2,
                found: 1
            }
            .code(),
            AnalysisErrorCodes::INSUFFICIENT_PEAKS
        );
        assert_eq!(
            AnalysisError::FitConvergence {
                reason: "test".to_string()
            }
            .code(),
            AnalysisErrorCodes::FIT_CONVERGENCE
        );
        assert_eq!(
            AnalysisError::InvalidDampingRegime { beta: 7.0 }.code(),
            AnalysisErrorCodes::INVALID_DAMPING_REGIME
        );
        assert_eq!(
            AnalysisError::InvalidFilterParams {
                cutoff_hz: 600.0,
                sampling_hz: 1000.0,
                order: 2
            }
            .code(),
            AnalysisErrorCodes::INVALID_FILTER_PARAMS
        );
    }

    #[test]
    fn test_analysis_error_messages() {
        let err = AnalysisError::InsufficientPeaks {
            required: 2,
            found: 0,
        };
        assert_eq!(
            err.message(),
            "Insufficient peaks for curve fitting: need 2, got 0"
        );

        let err = AnalysisError::invalid_input("need at least 2 samples");
        assert_eq!(err.message(), "Invalid input: need at least 2 samples");

        let err = AnalysisError::InvalidFilterParams {
            cutoff_hz: 600.0,
            sampling_hz: 1000.0,
            order: 2,
        };
        assert!(err.message().contains("Nyquist 500 Hz"));
    }

    #[test]
    fn test_analysis_error_display() {
        let err = AnalysisError::InvalidDampingRegime { beta: 7.0 };
        let display = format!("{}", err);
        assert!(display.starts_with("AnalysisError::InvalidDampingRegime"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_component_names() {
        assert_eq!(
            AnalysisError::InvalidDampingRegime { beta: 7.0 }.component(),
            "DecayFitter"
        );
        assert_eq!(
            AnalysisError::InsufficientPeaks {
                required: 2,
                found: 1
            }
            .component(),
            "DynamicPeakDetector"
        );
    }
}
