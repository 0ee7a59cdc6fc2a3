// Error types for the modal analysis toolchain
//
// This module defines the error taxonomy of the analysis core, providing
// structured error handling with stable error codes suitable for reports
// and process exit status mapping.

mod analysis;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error records in the
/// persisted analysis reports.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
