// Modal Probe - vibration test analysis toolkit
// Decay fitting, damping ratio and spectral analysis of recorded responses

// Module declarations
pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod error;
pub mod report;
pub mod storage;
pub mod sweep;

// Re-exports for convenience
pub use analysis::decay::{fit_exponential_decay, DecayFitResult};
pub use analysis::filter::{filter_series, low_pass, ButterworthLowPass};
pub use analysis::frequency::{estimate_dominant_frequency, FrequencyEstimator};
pub use analysis::peaks::{detect_peaks, DynamicPeakDetector, PeakSet};
pub use analysis::series::{SamplingEstimate, TimeSeries};
pub use analysis::spectrum::{analyze_spectrum, SpectralAnalyzer, SpectrumResult};
pub use analysis::{run_pipeline, PipelineReport};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, ErrorCode};

use tracing::Level;

/// Install a stderr fmt subscriber for `tracing` and `log` records
///
/// `verbosity` 0 → WARN, 1 → INFO, 2 → DEBUG, 3+ → TRACE. A second call is
/// a no-op.
pub fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if installed {
        log::debug!("Logging initialized at {}", level);
    }
}
